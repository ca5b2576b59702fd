//! Audio capture, playback, and voice activity detection.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod output;
pub mod resample;
pub mod source;
pub mod vad;

pub use output::{AudioOutput, MockAudioOutput};
pub use resample::resample;
pub use source::{AudioFrame, AudioSource, DeviceConfig, MockAudioSource};
pub use vad::{Clock, SystemClock, Vad, VadConfig, VoiceActivity};
