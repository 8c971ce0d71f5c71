use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prayer {
    Imsak,
    Subuh,
    Syuruk,
    Zohor,
    Asar,
    Maghrib,
    Isyak,
}

impl Prayer {
    pub const ALL: [Prayer; 7] = [
        Prayer::Imsak,
        Prayer::Subuh,
        Prayer::Syuruk,
        Prayer::Zohor,
        Prayer::Asar,
        Prayer::Maghrib,
        Prayer::Isyak,
    ];

    /// Order used when looking for the next upcoming prayer.
    pub const CANONICAL: [Prayer; 6] = [
        Prayer::Subuh,
        Prayer::Syuruk,
        Prayer::Zohor,
        Prayer::Asar,
        Prayer::Maghrib,
        Prayer::Isyak,
    ];

    /// Prayers that get a warning, call-to-prayer and iqamah countdown.
    /// Syuruk is display-only.
    pub const WITH_IQAMAH: [Prayer; 5] = [
        Prayer::Subuh,
        Prayer::Zohor,
        Prayer::Asar,
        Prayer::Maghrib,
        Prayer::Isyak,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Prayer::Imsak => "imsak",
            Prayer::Subuh => "subuh",
            Prayer::Syuruk => "syuruk",
            Prayer::Zohor => "zohor",
            Prayer::Asar => "asar",
            Prayer::Maghrib => "maghrib",
            Prayer::Isyak => "isyak",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Prayer::Imsak => "Imsak",
            Prayer::Subuh => "Subuh",
            Prayer::Syuruk => "Syuruk",
            Prayer::Zohor => "Zohor",
            Prayer::Asar => "Asar",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isyak => "Isyak",
        }
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A wall-clock time with minute precision, exactly as supplied by a source.
/// There is no timezone attached.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Accepts `HH:MM` optionally followed by seconds or any trailing text
    /// (`05:40:00`, `13:05 (GMT+8)`). Anything else is rejected.
    pub fn parse(input: &str) -> Option<Self> {
        let (hour, rest) = input.trim().split_once(':')?;
        let minute = rest.get(..2)?;
        if hour.is_empty() || hour.len() > 2 {
            return None;
        }
        if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        if rest[2..].starts_with(|ch: char| ch.is_ascii_digit()) {
            return None;
        }
        Self::new(hour.parse().ok()?, minute.parse().ok()?)
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn seconds_of_day(self) -> i64 {
        i64::from(self.hour) * 3_600 + i64::from(self.minute) * 60
    }

    pub fn format_12h(self) -> String {
        let meridiem = if self.hour >= 12 { "PM" } else { "AM" };
        let hour12 = match self.hour % 12 {
            0 => 12,
            other => other,
        };
        format!("{hour12}:{:02} {meridiem}", self.minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reads an optional time leniently: null, empty and malformed strings all
/// become `None` so a single bad field never invalidates a whole record.
pub fn deserialize_lenient_time<'de, D>(deserializer: D) -> Result<Option<TimeOfDay>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(TimeOfDay::parse))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    Cached,
    Calculated,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Remote => "remote",
            Source::Cached => "cached",
            Source::Calculated => "calculated",
        })
    }
}

/// One day of a month schedule, in the shape persisted to the cache file.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DayEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub hijri: String,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub imsak: Option<TimeOfDay>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub subuh: Option<TimeOfDay>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub syuruk: Option<TimeOfDay>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub zohor: Option<TimeOfDay>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub asar: Option<TimeOfDay>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub maghrib: Option<TimeOfDay>,
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub isyak: Option<TimeOfDay>,
}

impl DayEntry {
    pub fn time(&self, prayer: Prayer) -> Option<TimeOfDay> {
        match prayer {
            Prayer::Imsak => self.imsak,
            Prayer::Subuh => self.subuh,
            Prayer::Syuruk => self.syuruk,
            Prayer::Zohor => self.zohor,
            Prayer::Asar => self.asar,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isyak => self.isyak,
        }
    }
}

/// The persisted fallback for one zone and one month. Replaced wholesale on
/// every successful remote fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub zone: String,
    pub month: String,
    pub fetched_at: DateTime<Utc>,
    pub days: Vec<DayEntry>,
}

impl CacheRecord {
    /// The month label follows the fetched days, or the kiosk's local date
    /// when the month came back empty.
    pub fn new(zone: &str, fetched_at: DateTime<Utc>, days: Vec<DayEntry>) -> Self {
        let month_of = days
            .first()
            .map(|entry| entry.date)
            .unwrap_or_else(|| fetched_at.with_timezone(&Local).date_naive());
        Self {
            zone: zone.to_string(),
            month: month_of.format("%Y-%m").to_string(),
            fetched_at,
            days,
        }
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayEntry> {
        self.days.iter().find(|entry| entry.date == date)
    }
}

/// One calendar day's prayer schedule. Immutable once built; a refresh
/// produces a new value rather than editing this one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTimes {
    pub date: NaiveDate,
    pub hijri_label: Option<String>,
    times: BTreeMap<Prayer, TimeOfDay>,
    pub source: Source,
}

impl DailyTimes {
    pub fn new(
        date: NaiveDate,
        hijri_label: Option<String>,
        times: impl IntoIterator<Item = (Prayer, Option<TimeOfDay>)>,
        source: Source,
    ) -> Self {
        let times = times
            .into_iter()
            .filter_map(|(prayer, time)| time.map(|time| (prayer, time)))
            .collect();
        Self {
            date,
            hijri_label: hijri_label.filter(|label| !label.trim().is_empty()),
            times,
            source,
        }
    }

    pub fn from_entry(entry: &DayEntry, source: Source) -> Self {
        Self::new(
            entry.date,
            Some(entry.hijri.clone()),
            Prayer::ALL
                .into_iter()
                .map(|prayer| (prayer, entry.time(prayer))),
            source,
        )
    }

    /// `None` means the time is unknown for this day.
    pub fn time(&self, prayer: Prayer) -> Option<TimeOfDay> {
        self.times.get(&prayer).copied()
    }

    pub fn seconds_of_day(&self, prayer: Prayer) -> Option<i64> {
        self.time(prayer).map(TimeOfDay::seconds_of_day)
    }

    pub fn known_count(&self) -> usize {
        self.times.len()
    }
}

/// Trims a source time down to `HH:MM`. Returns `None` for anything that is
/// not a well-formed time.
pub fn normalize_time(raw: &str) -> Option<TimeOfDay> {
    TimeOfDay::parse(raw)
}

const DATE_FORMATS: [&str; 4] = ["%d-%b-%Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

pub fn seconds_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_time_trims_seconds_and_suffixes() {
        assert_eq!(normalize_time("05:40:00"), TimeOfDay::new(5, 40));
        assert_eq!(normalize_time(" 13:05 (GMT+8)"), TimeOfDay::new(13, 5));
        assert_eq!(normalize_time("7:05"), TimeOfDay::new(7, 5));
        assert_eq!(normalize_time("19:21"), TimeOfDay::new(19, 21));
    }

    #[test]
    fn normalize_time_rejects_malformed_values() {
        assert_eq!(normalize_time(""), None);
        assert_eq!(normalize_time("--:--"), None);
        assert_eq!(normalize_time("25:00"), None);
        assert_eq!(normalize_time("12:7"), None);
        assert_eq!(normalize_time("noon"), None);
    }

    #[test]
    fn normalize_date_accepts_esolat_and_iso_forms() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 1).expect("date");
        assert_eq!(normalize_date("01-Oct-2026"), Some(expected));
        assert_eq!(normalize_date("2026-10-01"), Some(expected));
        assert_eq!(normalize_date("01-10-2026"), Some(expected));
        assert_eq!(normalize_date("01/10/2026"), Some(expected));
        assert_eq!(normalize_date("someday"), None);
    }

    #[test]
    fn unknown_times_are_absent_not_midnight() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        let times = DailyTimes::new(
            date,
            None,
            [
                (Prayer::Subuh, normalize_time("")),
                (Prayer::Zohor, normalize_time("13:02:00")),
            ],
            Source::Remote,
        );
        assert_eq!(times.time(Prayer::Subuh), None);
        assert_eq!(times.seconds_of_day(Prayer::Zohor), Some(13 * 3_600 + 2 * 60));
        assert_eq!(times.known_count(), 1);
    }

    #[test]
    fn cache_entries_with_bad_times_read_back_as_unknown() {
        let json = r#"{
            "date": "2026-10-19",
            "hijri": "1448-04-27",
            "subuh": "",
            "zohor": "13:01",
            "isyak": null
        }"#;
        let entry: DayEntry = serde_json::from_str(json).expect("valid entry");
        assert_eq!(entry.subuh, None);
        assert_eq!(entry.zohor, TimeOfDay::new(13, 1));
        assert_eq!(entry.isyak, None);
        assert_eq!(entry.asar, None);
    }

    #[test]
    fn time_of_day_formats_both_clocks() {
        let time = TimeOfDay::new(0, 5).expect("time");
        assert_eq!(time.to_string(), "00:05");
        assert_eq!(time.format_12h(), "12:05 AM");
        let evening = TimeOfDay::new(19, 21).expect("time");
        assert_eq!(evening.format_12h(), "7:21 PM");
    }

    #[test]
    fn cache_month_follows_fetched_days_not_utc() {
        use chrono::TimeZone;

        // 01:00 on 1 October in Malaysia is still 30 September in UTC.
        let fetched = Utc.with_ymd_and_hms(2026, 9, 30, 17, 0, 0).single().expect("time");
        let entry: DayEntry =
            serde_json::from_str(r#"{"date": "2026-10-01", "zohor": "13:01"}"#).expect("entry");
        let record = CacheRecord::new("TRG01", fetched, vec![entry]);
        assert_eq!(record.month, "2026-10");

        let empty = CacheRecord::new("TRG01", fetched, Vec::new());
        let local_month = fetched.with_timezone(&Local).format("%Y-%m").to_string();
        assert_eq!(empty.month, local_month);
    }
}
