use std::path::Path;

use anyhow::Result;
use chrono::{NaiveDateTime, Timelike};

use crate::audio::CueKind;
use crate::audio::sinks::{asset_name, asset_present};
use crate::display::{format_prayer_time, next_prayer_line};
use crate::hijri::{gregorian_label, hijri_label, period_label};
use crate::prayer::model::{DailyTimes, Prayer, seconds_of_day};
use crate::prayer::next::next_prayer;
use crate::prayer::phase::{PhaseConfig, active_phase};
use crate::prayer::resolver::TimeSourceResolver;

pub struct DiagnosticsOptions<'a> {
    pub zone: &'a str,
    pub phase_config: PhaseConfig,
    pub format_24h: bool,
    pub audio_dir: &'a Path,
    pub now: NaiveDateTime,
}

pub fn run_diagnostics(
    resolver: &TimeSourceResolver,
    options: &DiagnosticsOptions<'_>,
) -> Result<()> {
    let times = resolver.resolve_for(options.zone, options.now.date())?;
    for line in report_lines(&times, options) {
        println!("{line}");
    }
    Ok(())
}

pub fn report_lines(times: &DailyTimes, options: &DiagnosticsOptions<'_>) -> Vec<String> {
    let now_secs = seconds_of_day(options.now.time());
    let hijri = times
        .hijri_label
        .clone()
        .unwrap_or_else(|| hijri_label(times.date));

    let mut lines = vec![
        "SurauClock diagnostics".to_string(),
        format!("Zone: {}", options.zone.trim().to_ascii_uppercase()),
        format!("Date: {}", gregorian_label(times.date)),
        format!("Hijri: {hijri}"),
        format!("Source: {}", times.source),
        format!(
            "Now: {} ({})",
            options.now.format("%H:%M:%S"),
            period_label(options.now.hour())
        ),
        "Prayer times:".to_string(),
    ];
    for prayer in Prayer::ALL {
        lines.push(format!(
            "  {:<8} {}",
            prayer.label(),
            format_prayer_time(times.time(prayer), options.format_24h)
        ));
    }

    match next_prayer(times, now_secs) {
        Some(next) => lines.push(format!("Next prayer: {}", next_prayer_line(&next))),
        None => lines.push("Next prayer: none (no known times)".to_string()),
    }
    match active_phase(times, &options.phase_config, now_secs) {
        Some((prayer, phase, Some(remaining))) => lines.push(format!(
            "Current phase: {phase:?} ({}, {remaining}s left)",
            prayer.label()
        )),
        Some((prayer, phase, None)) => {
            lines.push(format!("Current phase: {phase:?} ({})", prayer.label()))
        }
        None => lines.push("Current phase: Idle".to_string()),
    }
    for kind in [CueKind::CallToPrayer, CueKind::Tick] {
        let state = if asset_present(options.audio_dir, kind) {
            "found"
        } else {
            "missing, tones will play"
        };
        lines.push(format!("Audio {}: {state}", asset_name(kind)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::prayer::model::{Source, TimeOfDay};

    fn sample_times() -> DailyTimes {
        DailyTimes::new(
            NaiveDate::from_ymd_opt(2026, 10, 19).expect("date"),
            Some("8 Jamadilawal 1448H".to_string()),
            [
                (Prayer::Imsak, TimeOfDay::new(5, 32)),
                (Prayer::Subuh, TimeOfDay::new(5, 42)),
                (Prayer::Syuruk, TimeOfDay::new(6, 55)),
                (Prayer::Zohor, TimeOfDay::new(13, 0)),
                (Prayer::Asar, TimeOfDay::new(16, 7)),
                (Prayer::Maghrib, TimeOfDay::new(19, 0)),
                (Prayer::Isyak, None),
            ],
            Source::Cached,
        )
    }

    fn options_at(hour: u32, minute: u32) -> DiagnosticsOptions<'static> {
        DiagnosticsOptions {
            zone: "trg01",
            phase_config: PhaseConfig::default(),
            format_24h: true,
            audio_dir: Path::new("does-not-exist"),
            now: NaiveDate::from_ymd_opt(2026, 10, 19)
                .expect("date")
                .and_time(NaiveTime::from_hms_opt(hour, minute, 0).expect("time")),
        }
    }

    #[test]
    fn report_lists_source_times_and_phase() {
        let lines = report_lines(&sample_times(), &options_at(12, 55));
        let text = lines.join("\n");
        assert!(text.contains("Zone: TRG01"));
        assert!(text.contains("Source: cached"));
        assert!(text.contains("Hijri: 8 Jamadilawal 1448H"));
        assert!(text.contains("Zohor    13:00"));
        assert!(text.contains("Isyak    --:--"));
        assert!(text.contains("Next prayer: Zohor 00:05:00"));
        assert!(text.contains("Current phase: PreWarning (Zohor, 300s left)"));
        assert!(text.contains("Audio azan.mp3: missing, tones will play"));
    }

    #[test]
    fn report_wraps_to_tomorrow_after_last_prayer() {
        let lines = report_lines(&sample_times(), &options_at(21, 0));
        let text = lines.join("\n");
        assert!(text.contains("Next prayer: Subuh (esok)"));
        assert!(text.contains("Current phase: Idle"));
    }
}
