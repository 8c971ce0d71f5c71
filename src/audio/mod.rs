pub mod playback;
pub mod sinks;
pub mod tones;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::prayer::model::Prayer;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CueKind {
    PreWarning,
    CallToPrayer,
    Tick,
    Final,
}

impl CueKind {
    /// Used to suppress repeats when a backend cannot report clip length.
    pub fn nominal_length(self) -> Duration {
        match self {
            CueKind::CallToPrayer => Duration::from_secs(180),
            CueKind::PreWarning | CueKind::Tick | CueKind::Final => Duration::from_secs(2),
        }
    }
}

impl fmt::Display for CueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CueKind::PreWarning => "pre-warning",
            CueKind::CallToPrayer => "call-to-prayer",
            CueKind::Tick => "tick",
            CueKind::Final => "final",
        })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Cue {
    pub kind: CueKind,
    pub prayer: Prayer,
}

impl Cue {
    pub fn new(kind: CueKind, prayer: Prayer) -> Self {
        Self { kind, prayer }
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio asset not found: {}", .0.display())]
    MissingAsset(PathBuf),
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
}

/// One way of rendering a cue audibly.
pub trait AudioSink: Send {
    fn name(&self) -> &'static str;
    /// Starts playback without waiting for it to finish. Returns the clip
    /// length when known.
    fn play(&self, cue: Cue, volume: f32) -> Result<Option<Duration>, AudioError>;
    fn stop(&self) {}
}

/// Ordered fallback list of sinks. The first sink that accepts a cue plays
/// it; failures are logged and never reach the caller.
pub struct AudioChain {
    sinks: Vec<Box<dyn AudioSink>>,
    enabled: bool,
    volume: f32,
    playing_until: HashMap<CueKind, Instant>,
}

impl AudioChain {
    pub fn new(sinks: Vec<Box<dyn AudioSink>>, enabled: bool, volume: f32) -> Self {
        Self {
            sinks,
            enabled,
            volume: volume.clamp(0.0, 1.0),
            playing_until: HashMap::new(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled && !enabled {
            self.stop();
        }
        self.enabled = enabled;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn play_cue(&mut self, cue: Cue) -> Option<&'static str> {
        self.play_cue_at(cue, Instant::now())
    }

    /// Returns the name of the sink that took the cue, or `None` when the cue
    /// was muted, already playing, or every sink failed.
    pub fn play_cue_at(&mut self, cue: Cue, now: Instant) -> Option<&'static str> {
        if !self.enabled {
            tracing::debug!(cue = %cue.kind, "audio disabled, cue skipped");
            return None;
        }
        if self
            .playing_until
            .get(&cue.kind)
            .is_some_and(|until| now < *until)
        {
            tracing::debug!(cue = %cue.kind, "cue already playing");
            return None;
        }

        for sink in &self.sinks {
            match sink.play(cue, self.volume) {
                Ok(length) => {
                    let length = length.unwrap_or_else(|| cue.kind.nominal_length());
                    self.playing_until.insert(cue.kind, now + length);
                    tracing::debug!(cue = %cue.kind, sink = sink.name(), "cue playing");
                    return Some(sink.name());
                }
                Err(AudioError::MissingAsset(path)) => {
                    tracing::debug!(
                        cue = %cue.kind,
                        sink = sink.name(),
                        file = %path.display(),
                        "asset missing, trying next sink"
                    );
                }
                Err(err) => {
                    tracing::warn!(cue = %cue.kind, sink = sink.name(), error = %err, "audio sink failed");
                }
            }
        }

        tracing::warn!(cue = %cue.kind, prayer = %cue.prayer, "no audio sink could play cue");
        None
    }

    pub fn stop(&mut self) {
        for sink in &self.sinks {
            sink.stop();
        }
        self.playing_until.clear();
    }
}
