use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::audio::CueKind;
use crate::prayer::model::{DailyTimes, Prayer, seconds_of_day};

/// A heads-up edge still counts if the tick lands this many seconds late.
pub const HEADS_UP_TOLERANCE_SECS: i64 = 2;
/// How long after an iqamah countdown ends the final cue may still fire.
pub const FINAL_CUE_GRACE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseConfig {
    pub warning_minutes: u32,
    pub iqamah_minutes: u32,
    pub active_window_secs: u32,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            warning_minutes: 10,
            iqamah_minutes: 10,
            active_window_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    PreWarning,
    ActiveWindow,
    PostWindowCountdown,
}

impl Phase {
    /// Cue fired the first time a prayer enters this phase on a given day.
    pub fn entry_cue(self) -> Option<CueKind> {
        match self {
            Phase::PreWarning => Some(CueKind::PreWarning),
            Phase::ActiveWindow => Some(CueKind::CallToPrayer),
            Phase::Idle | Phase::PostWindowCountdown => None,
        }
    }
}

/// Phase boundaries for one prayer, in seconds of day.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PhaseWindow {
    pub pre_start: i64,
    pub prayer_time: i64,
    pub active_end: i64,
    pub iqamah_end: i64,
}

impl PhaseWindow {
    pub fn new(prayer_time: i64, config: &PhaseConfig) -> Self {
        let active_end = prayer_time + i64::from(config.active_window_secs);
        Self {
            pre_start: prayer_time - i64::from(config.warning_minutes) * 60,
            prayer_time,
            active_end,
            iqamah_end: active_end + i64::from(config.iqamah_minutes) * 60,
        }
    }

    /// Phase at `now` plus the seconds left in it. The active window carries
    /// no countdown.
    pub fn classify(&self, now: i64) -> (Phase, Option<i64>) {
        if (self.pre_start..self.prayer_time).contains(&now) {
            (Phase::PreWarning, Some(self.prayer_time - now))
        } else if (self.prayer_time..self.active_end).contains(&now) {
            (Phase::ActiveWindow, None)
        } else if (self.active_end..self.iqamah_end).contains(&now) {
            (Phase::PostWindowCountdown, Some(self.iqamah_end - now))
        } else {
            (Phase::Idle, None)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseEvent {
    pub prayer: Prayer,
    pub phase: Phase,
    pub remaining_secs: Option<i64>,
    pub first_in_phase: bool,
    pub cues: Vec<CueKind>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
enum Trigger {
    Entered(Phase),
    HeadsUp,
    Final,
}

/// The single non-idle prayer at `now_secs`, if any. Prayers are checked in
/// canonical order and the first match wins when windows overlap.
pub fn active_phase(
    times: &DailyTimes,
    config: &PhaseConfig,
    now_secs: i64,
) -> Option<(Prayer, Phase, Option<i64>)> {
    Prayer::WITH_IQAMAH.into_iter().find_map(|prayer| {
        let window = PhaseWindow::new(times.seconds_of_day(prayer)?, config);
        match window.classify(now_secs) {
            (Phase::Idle, _) => None,
            (phase, remaining) => Some((prayer, phase, remaining)),
        }
    })
}

/// Drives per-prayer phase events off wall-clock ticks. Phases are recomputed
/// from the clock every call; only trigger history is carried between calls,
/// and it is dropped whenever the calendar date changes.
pub struct PhaseScheduler {
    config: PhaseConfig,
    fired: HashSet<(Prayer, Trigger)>,
    last_date: Option<NaiveDate>,
}

impl PhaseScheduler {
    pub fn new(config: PhaseConfig) -> Self {
        Self {
            config,
            fired: HashSet::new(),
            last_date: None,
        }
    }

    pub fn config(&self) -> PhaseConfig {
        self.config
    }

    /// Takes effect on the next tick. Trigger history is kept so a changed
    /// lead time cannot replay a cue that already fired today.
    pub fn set_config(&mut self, config: PhaseConfig) {
        if config != self.config {
            tracing::info!(
                warning_minutes = config.warning_minutes,
                iqamah_minutes = config.iqamah_minutes,
                active_window_secs = config.active_window_secs,
                "phase timings updated"
            );
        }
        self.config = config;
    }

    pub fn advance(&mut self, times: &DailyTimes, now: NaiveDateTime) -> Vec<PhaseEvent> {
        let today = now.date();
        if self.last_date != Some(today) {
            if self.last_date.is_some() {
                tracing::debug!(date = %today, "new day, clearing trigger history");
            }
            self.fired.clear();
            self.last_date = Some(today);
        }

        let now_secs = seconds_of_day(now.time());
        let active = active_phase(times, &self.config, now_secs);
        let mut events = Vec::new();

        for prayer in Prayer::WITH_IQAMAH {
            let Some(prayer_time) = times.seconds_of_day(prayer) else {
                continue;
            };
            let window = PhaseWindow::new(prayer_time, &self.config);
            let mut cues = Vec::new();

            let (phase, remaining_secs, first_in_phase) = match active {
                Some((winner, phase, remaining)) if winner == prayer => {
                    let first = self.fired.insert((prayer, Trigger::Entered(phase)));
                    if first && let Some(cue) = phase.entry_cue() {
                        cues.push(cue);
                    }
                    (phase, remaining, first)
                }
                _ => (Phase::Idle, None, false),
            };

            if self.config.warning_minutes > 0
                && (window.pre_start..window.pre_start + HEADS_UP_TOLERANCE_SECS)
                    .contains(&now_secs)
                && self.fired.insert((prayer, Trigger::HeadsUp))
            {
                cues.push(CueKind::Tick);
            }

            if self.config.iqamah_minutes > 0
                && (window.iqamah_end..window.iqamah_end + FINAL_CUE_GRACE_SECS)
                    .contains(&now_secs)
                && self.fired.insert((prayer, Trigger::Final))
            {
                cues.push(CueKind::Final);
            }

            if phase != Phase::Idle || !cues.is_empty() {
                events.push(PhaseEvent {
                    prayer,
                    phase,
                    remaining_secs,
                    first_in_phase,
                    cues,
                });
            }
        }

        for event in &events {
            for cue in &event.cues {
                tracing::info!(prayer = %event.prayer, phase = ?event.phase, cue = %cue, "cue fired");
            }
        }
        events
    }
}
