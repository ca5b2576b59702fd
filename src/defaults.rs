//! Default configuration constants for voxloop.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default capture frame duration in milliseconds.
///
/// 20ms frames give the VAD enough signal to estimate energy reliably while
/// keeping end-of-turn latency low. Providers generally accept 20-30ms.
pub const FRAME_MS: u32 = 20;

/// Default Voice Activity Detection (VAD) threshold.
///
/// This RMS-based threshold (0.0 to 1.0) determines when audio is considered
/// speech. A value of 0.02 is tuned for typical microphone input levels and
/// provides good sensitivity while filtering out background noise. Thresholds
/// are acoustically environment-dependent; always keep this configurable.
pub const VAD_THRESHOLD: f32 = 0.02;

/// Base silence duration in milliseconds before a turn is tentatively done.
///
/// 2000ms allows for natural mid-sentence pauses without prematurely cutting
/// the speaker off. The segmenter extends this for longer utterances.
pub const BASE_SILENCE_MS: u32 = 2000;

/// Wait-time extension per ten words of transcript, in milliseconds.
///
/// Longer utterances earn more trailing tolerance:
/// `wait = min(base + floor(words/10) * step, cap)`.
pub const SILENCE_STEP_MS: u32 = 200;

/// Upper bound on the extended silence wait, in milliseconds.
pub const SILENCE_CAP_MS: u32 = 3500;

/// Word count below which an unpunctuated transcript is judged incomplete.
///
/// Catches clipped clause openers ("so I was") while letting the shortest
/// complete commands ("stop", "yes please") finalize on base silence alone.
pub const SHORT_UTTERANCE_WORDS: usize = 4;

/// Minimum delay before capture resumes after playback, in milliseconds.
///
/// A natural human response gap; the actual delay is drawn uniformly from
/// [`RESUME_DELAY_MIN_MS`, `RESUME_DELAY_MAX_MS`] to avoid robotic timing.
pub const RESUME_DELAY_MIN_MS: u32 = 200;

/// Maximum delay before capture resumes after playback, in milliseconds.
pub const RESUME_DELAY_MAX_MS: u32 = 500;

/// Playback scheduling lead in milliseconds.
///
/// The play-head is initialized to now + this lead on first use, giving the
/// output device time to start cleanly without an audible gap.
pub const PLAYBACK_LEAD_MS: u32 = 30;

/// Backoff after a turn is abandoned on a stream error, in milliseconds.
///
/// Long enough to avoid hammering a failing backend, short enough that the
/// session feels responsive when the user speaks again.
pub const TURN_ERROR_BACKOFF_MS: u64 = 250;
