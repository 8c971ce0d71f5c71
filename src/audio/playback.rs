use std::path::Path;
use std::time::Duration;

use crate::audio::AudioError;
use crate::audio::tones::{Tone, pattern_length};

/// Output device abstraction. Calls return once playback has been queued.
pub trait Playback: Send + Sync {
    /// Returns the clip length when the decoder knows it.
    fn play_file(&self, path: &Path, volume: f32) -> Result<Option<Duration>, AudioError>;
    fn play_tones(&self, tones: &[Tone], volume: f32) -> Result<Duration, AudioError>;
    fn stop(&self);
}

/// Headless backend: records what would have played.
#[derive(Debug, Default)]
pub struct LoggingPlayback;

impl Playback for LoggingPlayback {
    fn play_file(&self, path: &Path, volume: f32) -> Result<Option<Duration>, AudioError> {
        tracing::info!(file = %path.display(), volume, "audio (headless): play file");
        Ok(None)
    }

    fn play_tones(&self, tones: &[Tone], volume: f32) -> Result<Duration, AudioError> {
        let length = pattern_length(tones);
        tracing::info!(
            notes = tones.len(),
            seconds = length.as_secs_f32(),
            volume,
            "audio (headless): play tones"
        );
        Ok(length)
    }

    fn stop(&self) {
        tracing::debug!("audio (headless): stop");
    }
}

#[cfg(feature = "playback")]
pub use device::RodioPlayback;

#[cfg(feature = "playback")]
mod device {
    use std::f32::consts::PI;
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::mpsc::{self, Sender};
    use std::thread;
    use std::time::Duration;

    use rodio::{Decoder, OutputStream, Sink, Source};

    use super::Playback;
    use crate::audio::AudioError;
    use crate::audio::tones::{Tone, pattern_length};

    const SAMPLE_RATE: u32 = 44_100;

    type BoxedSource = Box<dyn Source<Item = f32> + Send>;

    enum Command {
        Play(BoxedSource, f32),
        Stop,
    }

    /// Plays through the default output device. The stream is not `Send`, so
    /// it lives on a dedicated thread fed over a channel.
    pub struct RodioPlayback {
        tx: Mutex<Sender<Command>>,
    }

    impl RodioPlayback {
        pub fn new() -> Result<Self, AudioError> {
            let (tx, rx) = mpsc::channel::<Command>();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

            thread::Builder::new()
                .name("audio-playback".to_string())
                .spawn(move || {
                    let (_stream, handle) = match OutputStream::try_default() {
                        Ok(pair) => pair,
                        Err(err) => {
                            let _ = ready_tx.send(Err(err.to_string()));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));

                    let mut sinks: Vec<Sink> = Vec::new();
                    while let Ok(command) = rx.recv() {
                        sinks.retain(|sink| !sink.empty());
                        match command {
                            Command::Stop => {
                                for sink in sinks.drain(..) {
                                    sink.stop();
                                }
                            }
                            Command::Play(source, volume) => match Sink::try_new(&handle) {
                                Ok(sink) => {
                                    sink.append(source);
                                    sink.set_volume(volume.clamp(0.0, 1.0));
                                    sinks.push(sink);
                                }
                                Err(err) => {
                                    tracing::warn!(error = %err, "unable to open audio sink");
                                }
                            },
                        }
                    }
                })
                .map_err(|err| AudioError::DeviceUnavailable(err.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Self { tx: Mutex::new(tx) }),
                Ok(Err(reason)) => Err(AudioError::DeviceUnavailable(reason)),
                Err(_) => Err(AudioError::DeviceUnavailable(
                    "audio thread exited during start-up".to_string(),
                )),
            }
        }

        fn send(&self, command: Command) -> Result<(), AudioError> {
            let tx = self
                .tx
                .lock()
                .map_err(|_| AudioError::Playback("audio channel poisoned".to_string()))?;
            tx.send(command)
                .map_err(|_| AudioError::DeviceUnavailable("audio thread stopped".to_string()))
        }
    }

    impl Playback for RodioPlayback {
        fn play_file(&self, path: &Path, volume: f32) -> Result<Option<Duration>, AudioError> {
            let file = File::open(path)
                .map_err(|err| AudioError::Playback(format!("{}: {err}", path.display())))?;
            let decoder = Decoder::new(BufReader::new(file))
                .map_err(|err| AudioError::Playback(format!("{}: {err}", path.display())))?;
            let length = decoder.total_duration();
            self.send(Command::Play(Box::new(decoder.convert_samples::<f32>()), volume))?;
            Ok(length)
        }

        fn play_tones(&self, tones: &[Tone], volume: f32) -> Result<Duration, AudioError> {
            let source = ToneSource::new(tones.to_vec());
            let length = pattern_length(tones);
            self.send(Command::Play(Box::new(source), volume))?;
            Ok(length)
        }

        fn stop(&self) {
            let _ = self.send(Command::Stop);
        }
    }

    /// Mono sum of decaying sine notes.
    pub struct ToneSource {
        tones: Vec<Tone>,
        total_samples: usize,
        num_sample: usize,
    }

    impl ToneSource {
        fn new(tones: Vec<Tone>) -> Self {
            let total_samples =
                (pattern_length(&tones).as_secs_f32() * SAMPLE_RATE as f32).ceil() as usize;
            Self {
                tones,
                total_samples,
                num_sample: 0,
            }
        }
    }

    impl Iterator for ToneSource {
        type Item = f32;

        fn next(&mut self) -> Option<Self::Item> {
            if self.num_sample >= self.total_samples {
                return None;
            }
            let t = self.num_sample as f32 / SAMPLE_RATE as f32;
            self.num_sample += 1;

            let sample = self
                .tones
                .iter()
                .filter(|tone| t >= tone.start_secs && t < tone.start_secs + tone.duration_secs)
                .map(|tone| {
                    let local = t - tone.start_secs;
                    let decay = 0.001_f32.powf(local / tone.duration_secs);
                    (2.0 * PI * tone.freq_hz * local).sin() * tone.gain * decay
                })
                .sum::<f32>();
            Some(sample.clamp(-1.0, 1.0))
        }
    }

    impl Source for ToneSource {
        fn current_frame_len(&self) -> Option<usize> {
            Some(self.total_samples.saturating_sub(self.num_sample))
        }

        fn channels(&self) -> u16 {
            1
        }

        fn sample_rate(&self) -> u32 {
            SAMPLE_RATE
        }

        fn total_duration(&self) -> Option<Duration> {
            Some(Duration::from_secs_f32(
                self.total_samples as f32 / SAMPLE_RATE as f32,
            ))
        }
    }

}
