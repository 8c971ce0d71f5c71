use serde::Serialize;

use crate::prayer::model::{DailyTimes, Prayer, SECONDS_PER_DAY};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPrayer {
    pub name: Prayer,
    /// Target in seconds since today's midnight; exceeds a day when the
    /// target is tomorrow's Subuh.
    pub seconds_of_day: i64,
    pub is_tomorrow: bool,
    pub remaining_seconds: i64,
}

/// First prayer in canonical order that is still ahead of `now_seconds`.
/// Past Isyak this wraps to tomorrow's Subuh, using today's Subuh time as
/// the estimate. Unknown times are skipped. Returns `None` only when no
/// canonical prayer has a known time.
pub fn next_prayer(times: &DailyTimes, now_seconds: i64) -> Option<NextPrayer> {
    let upcoming = Prayer::CANONICAL.into_iter().find_map(|prayer| {
        let target = times.seconds_of_day(prayer)?;
        (target > now_seconds).then_some((prayer, target, false))
    });

    let (name, seconds_of_day, is_tomorrow) = match upcoming {
        Some(found) => found,
        None => {
            let (prayer, target) = Prayer::CANONICAL
                .into_iter()
                .find_map(|prayer| times.seconds_of_day(prayer).map(|secs| (prayer, secs)))?;
            (prayer, target + SECONDS_PER_DAY, true)
        }
    };

    Some(NextPrayer {
        name,
        seconds_of_day,
        is_tomorrow,
        remaining_seconds: (seconds_of_day - now_seconds).rem_euclid(SECONDS_PER_DAY),
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::prayer::model::{Source, TimeOfDay};

    fn sample() -> DailyTimes {
        let at = |h, m| TimeOfDay::new(h, m);
        DailyTimes::new(
            NaiveDate::from_ymd_opt(2026, 10, 19).expect("date"),
            None,
            [
                (Prayer::Imsak, at(5, 32)),
                (Prayer::Subuh, at(5, 42)),
                (Prayer::Syuruk, at(6, 51)),
                (Prayer::Zohor, at(13, 0)),
                (Prayer::Asar, at(16, 7)),
                (Prayer::Maghrib, at(18, 52)),
                (Prayer::Isyak, at(20, 0)),
            ],
            Source::Remote,
        )
    }

    #[test]
    fn picks_first_prayer_after_now() {
        let next = next_prayer(&sample(), 12 * 3_600).expect("next");
        assert_eq!(next.name, Prayer::Zohor);
        assert!(!next.is_tomorrow);
        assert_eq!(next.remaining_seconds, 3_600);
    }

    #[test]
    fn exact_prayer_second_moves_on_to_the_following_one() {
        let next = next_prayer(&sample(), 13 * 3_600).expect("next");
        assert_eq!(next.name, Prayer::Asar);
    }

    #[test]
    fn wraps_to_tomorrow_subuh_after_isyak() {
        let now = 23 * 3_600;
        let subuh = 5 * 3_600 + 42 * 60;
        let next = next_prayer(&sample(), now).expect("next");
        assert_eq!(next.name, Prayer::Subuh);
        assert!(next.is_tomorrow);
        assert_eq!(next.seconds_of_day, subuh + SECONDS_PER_DAY);
        assert_eq!(next.remaining_seconds, subuh + SECONDS_PER_DAY - now);
    }

    #[test]
    fn remaining_is_always_within_one_day() {
        let times = sample();
        for now in (0..SECONDS_PER_DAY).step_by(397) {
            let next = next_prayer(&times, now).expect("next");
            assert!((0..SECONDS_PER_DAY).contains(&next.remaining_seconds));
        }
    }

    #[test]
    fn unknown_times_are_skipped() {
        let times = DailyTimes::new(
            NaiveDate::from_ymd_opt(2026, 10, 19).expect("date"),
            None,
            [
                (Prayer::Subuh, TimeOfDay::new(5, 42)),
                (Prayer::Zohor, None),
                (Prayer::Asar, TimeOfDay::new(16, 7)),
            ],
            Source::Cached,
        );
        let next = next_prayer(&times, 12 * 3_600).expect("next");
        assert_eq!(next.name, Prayer::Asar);
    }

    #[test]
    fn no_known_times_means_no_next_prayer() {
        let times = DailyTimes::new(
            NaiveDate::from_ymd_opt(2026, 10, 19).expect("date"),
            None,
            [],
            Source::Cached,
        );
        assert!(next_prayer(&times, 0).is_none());
    }
}
