use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::playback::Playback;
use crate::audio::tones::pattern;
use crate::audio::{AudioError, AudioSink, Cue, CueKind};

pub const CALL_TO_PRAYER_FILE: &str = "azan.mp3";
pub const BEEP_FILE: &str = "beep.mp3";

/// Plays recorded assets from a directory. A missing file is reported as
/// `MissingAsset` so the chain can move on.
pub struct FileBackedSink {
    dir: PathBuf,
    playback: Arc<dyn Playback>,
}

impl FileBackedSink {
    pub fn new(dir: impl Into<PathBuf>, playback: Arc<dyn Playback>) -> Self {
        Self {
            dir: dir.into(),
            playback,
        }
    }

    pub fn asset_path(&self, kind: CueKind) -> PathBuf {
        self.dir.join(asset_name(kind))
    }
}

pub fn asset_name(kind: CueKind) -> &'static str {
    match kind {
        CueKind::CallToPrayer => CALL_TO_PRAYER_FILE,
        CueKind::PreWarning | CueKind::Tick | CueKind::Final => BEEP_FILE,
    }
}

pub fn asset_present(dir: &Path, kind: CueKind) -> bool {
    dir.join(asset_name(kind)).is_file()
}

impl AudioSink for FileBackedSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn play(&self, cue: Cue, volume: f32) -> Result<Option<Duration>, AudioError> {
        let path = self.asset_path(cue.kind);
        if !path.is_file() {
            return Err(AudioError::MissingAsset(path));
        }
        self.playback.play_file(&path, volume)
    }

    fn stop(&self) {
        self.playback.stop();
    }
}

/// Generated tone sequences; needs no assets.
pub struct SynthesizedToneSink {
    playback: Arc<dyn Playback>,
}

impl SynthesizedToneSink {
    pub fn new(playback: Arc<dyn Playback>) -> Self {
        Self { playback }
    }
}

impl AudioSink for SynthesizedToneSink {
    fn name(&self) -> &'static str {
        "tone"
    }

    fn play(&self, cue: Cue, volume: f32) -> Result<Option<Duration>, AudioError> {
        let tones = pattern(cue);
        self.playback.play_tones(&tones, volume).map(Some)
    }

    fn stop(&self) {
        self.playback.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::audio::AudioChain;
    use crate::audio::playback::LoggingPlayback;
    use crate::prayer::model::Prayer;

    fn chain_for(dir: &Path) -> AudioChain {
        let playback: Arc<dyn Playback> = Arc::new(LoggingPlayback);
        AudioChain::new(
            vec![
                Box::new(FileBackedSink::new(dir, Arc::clone(&playback))),
                Box::new(SynthesizedToneSink::new(playback)),
            ],
            true,
            0.8,
        )
    }

    #[test]
    fn missing_call_file_falls_back_to_tones() {
        let dir = tempdir().expect("tempdir");
        let mut audio = chain_for(dir.path());
        let cue = Cue::new(CueKind::CallToPrayer, Prayer::Subuh);
        assert_eq!(audio.play_cue(cue), Some("tone"));
    }

    #[test]
    fn present_asset_is_preferred() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join(BEEP_FILE), b"not really audio").expect("write");
        let mut audio = chain_for(dir.path());

        assert!(asset_present(dir.path(), CueKind::Tick));
        assert!(!asset_present(dir.path(), CueKind::CallToPrayer));
        assert_eq!(
            audio.play_cue(Cue::new(CueKind::Tick, Prayer::Zohor)),
            Some("file")
        );
        assert_eq!(
            audio.play_cue(Cue::new(CueKind::CallToPrayer, Prayer::Zohor)),
            Some("tone")
        );
    }
}
