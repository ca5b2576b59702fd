//! voxloop - Real-time voice turn-taking engine.
//!
//! Continuous capture, voice-activity-triggered end-of-turn detection,
//! streaming transcription with per-turn correlation, and gapless reply
//! playback, behind pluggable backend traits.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dialogue;
pub mod error;
pub mod playback;
pub mod session;
pub mod stt;
pub mod synth;
pub mod turn;

// Core traits (capture → recognize → respond → speak)
pub use audio::output::AudioOutput;
pub use audio::source::{AudioSource, DeviceConfig};
pub use dialogue::DialogueResponder;
pub use stt::recognizer::Recognizer;
pub use synth::Synthesizer;

// Session
pub use session::{Session, SessionConfig, SessionEvent, SessionHandle, SessionState};

// Turn machinery
pub use turn::{TurnCorrelator, TurnId, TurnSegmenter};

// Error handling
pub use error::{Result, VoxloopError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
