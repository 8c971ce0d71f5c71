use std::time::Duration;

use crate::audio::{Cue, CueKind};
use crate::prayer::model::Prayer;

/// Beeps play quieter than the configured volume.
pub const BEEP_GAIN: f32 = 0.4;
pub const MELODY_GAIN: f32 = 0.35;

/// One sine note, decaying to silence over its duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq_hz: f32,
    pub start_secs: f32,
    pub duration_secs: f32,
    pub gain: f32,
}

const fn note(freq_hz: f32, start_secs: f32, duration_secs: f32, gain: f32) -> Tone {
    Tone {
        freq_hz,
        start_secs,
        duration_secs,
        gain,
    }
}

const WARNING_BEEPS: [Tone; 3] = [
    note(880.0, 0.0, 0.3, BEEP_GAIN),
    note(880.0, 0.5, 0.3, BEEP_GAIN),
    note(1100.0, 1.0, 0.4, BEEP_GAIN),
];

/// Heads-up: two short, quieter beeps.
const HEADS_UP_BEEPS: [Tone; 2] = [
    note(880.0, 0.0, 0.15, BEEP_GAIN * 0.6),
    note(880.0, 0.3, 0.15, BEEP_GAIN * 0.6),
];

const FINAL_BEEPS: [Tone; 2] = [
    note(1100.0, 0.0, 0.3, BEEP_GAIN),
    note(880.0, 0.5, 0.6, BEEP_GAIN),
];

const CALL_MELODY: [Tone; 22] = [
    note(440.0, 0.0, 0.8, MELODY_GAIN),
    note(523.0, 0.9, 0.6, MELODY_GAIN),
    note(587.0, 1.6, 1.0, MELODY_GAIN),
    note(523.0, 2.7, 0.8, MELODY_GAIN),
    note(440.0, 4.0, 0.8, MELODY_GAIN),
    note(523.0, 4.9, 0.6, MELODY_GAIN),
    note(587.0, 5.6, 1.0, MELODY_GAIN),
    note(523.0, 6.7, 0.8, MELODY_GAIN),
    note(392.0, 8.0, 0.6, MELODY_GAIN),
    note(440.0, 8.7, 0.6, MELODY_GAIN),
    note(523.0, 9.4, 0.8, MELODY_GAIN),
    note(587.0, 10.3, 1.2, MELODY_GAIN),
    note(659.0, 12.0, 0.8, MELODY_GAIN),
    note(587.0, 12.9, 0.6, MELODY_GAIN),
    note(523.0, 13.6, 0.8, MELODY_GAIN),
    note(440.0, 14.5, 1.2, MELODY_GAIN),
    note(440.0, 16.0, 0.8, MELODY_GAIN),
    note(523.0, 16.9, 0.6, MELODY_GAIN),
    note(587.0, 17.6, 1.5, MELODY_GAIN),
    note(523.0, 19.5, 0.6, MELODY_GAIN),
    note(440.0, 20.2, 0.6, MELODY_GAIN),
    note(392.0, 20.9, 2.0, MELODY_GAIN),
];

/// Extra phrase appended to the Subuh call.
const SUBUH_EXTENSION: [Tone; 4] = [
    note(587.0, 23.5, 0.8, MELODY_GAIN),
    note(523.0, 24.4, 0.6, MELODY_GAIN),
    note(440.0, 25.1, 0.8, MELODY_GAIN),
    note(392.0, 26.0, 1.5, MELODY_GAIN),
];

pub fn pattern(cue: Cue) -> Vec<Tone> {
    match cue.kind {
        CueKind::PreWarning => WARNING_BEEPS.to_vec(),
        CueKind::Tick => HEADS_UP_BEEPS.to_vec(),
        CueKind::Final => FINAL_BEEPS.to_vec(),
        CueKind::CallToPrayer => {
            let mut melody = CALL_MELODY.to_vec();
            if cue.prayer == Prayer::Subuh {
                melody.extend_from_slice(&SUBUH_EXTENSION);
            }
            melody
        }
    }
}

/// Time until the last note has finished.
pub fn pattern_length(tones: &[Tone]) -> Duration {
    let end = tones
        .iter()
        .map(|tone| tone.start_secs + tone.duration_secs)
        .fold(0.0_f32, f32::max);
    Duration::from_secs_f32(end.max(0.0))
}
