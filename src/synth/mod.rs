//! Speech synthesis backend contract.
//!
//! Reply audio reaches the engine two ways: a synthesizer backend renders the
//! reply text, or the dialogue responder returns audio out-of-band with its
//! reply. Both produce [`SynthesizedAudio`] and feed the same playback
//! scheduler contract.

use crate::config::VoiceConfig;
use crate::error::{Result, VoxloopError};
use async_trait::async_trait;
use std::time::Duration;

/// A chunk of synthesized reply audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    /// PCM samples (16-bit signed integers), mono.
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    /// Creates a chunk from raw samples.
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Playback duration of this chunk.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Decodes WAV-encoded reply audio (the common out-of-band TTS format),
    /// mixing multi-channel content down to mono.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let reader =
            hound::WavReader::new(std::io::Cursor::new(bytes)).map_err(|e| {
                VoxloopError::Synthesis {
                    message: format!("invalid WAV reply audio: {}", e),
                }
            })?;

        let spec = reader.spec();
        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| VoxloopError::Synthesis {
                    message: format!("corrupt WAV reply audio: {}", e),
                })?,
            (hound::SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| VoxloopError::Synthesis {
                    message: format!("corrupt WAV reply audio: {}", e),
                })?,
            (format, bits) => {
                return Err(VoxloopError::Synthesis {
                    message: format!("unsupported WAV format: {:?}/{} bits", format, bits),
                });
            }
        };

        let mono = crate::audio::resample::mix_to_mono(&samples, spec.channels as usize);

        Ok(Self {
            samples: mono,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Backend that renders reply text to audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes `text` with the given voice settings.
    ///
    /// # Errors
    /// `Synthesis` when no audio could be produced; the session resumes
    /// listening rather than hanging on the reply.
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<SynthesizedAudio>;
}

/// Mock synthesizer for testing.
///
/// Produces deterministic audio whose duration is proportional to the text
/// length, scaled by the configured speaking rate.
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    sample_rate: u32,
    ms_per_char: u32,
    should_fail: bool,
}

impl MockSynthesizer {
    /// Creates a mock producing 16kHz audio at 50ms per character.
    pub fn new() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            ms_per_char: 50,
            should_fail: false,
        }
    }

    /// Configure the output sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Configure the mock to fail on synthesize.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<SynthesizedAudio> {
        if self.should_fail {
            return Err(VoxloopError::Synthesis {
                message: "mock synthesis failure".to_string(),
            });
        }

        let duration_ms = (text.chars().count() as f32 * self.ms_per_char as f32
            / voice.rate.max(0.1)) as u32;
        let sample_count = (self.sample_rate * duration_ms / 1000) as usize;
        let volume = voice.volume.clamp(0.0, 1.0);

        // Audible but cheap: a constant-amplitude buffer is enough to assert
        // durations and scheduling against
        let amplitude = (volume * 8000.0) as i16;
        Ok(SynthesizedAudio::new(
            vec![amplitude; sample_count],
            self.sample_rate,
        ))
    }
}
