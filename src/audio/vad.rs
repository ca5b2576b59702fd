//! Voice Activity Detection (VAD) module.
//!
//! Classifies audio frames as speech or silence from time-domain RMS energy
//! and tracks how long the current silence has lasted. Turn-level decisions
//! (when a silence means the speaker is done) belong to the turn segmenter;
//! this module has no side effects beyond its own [`VoiceActivity`] state.

use crate::defaults;
use std::time::Instant;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Configuration for Voice Activity Detection.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// RMS threshold for detecting speech (0.0 to 1.0).
    ///
    /// Acoustically environment-dependent; always sourced from configuration.
    pub speech_threshold: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::VAD_THRESHOLD,
        }
    }
}

/// Per-frame voice activity state.
///
/// Recomputed on every frame; `silence_started_at` is set on the
/// speech→silence transition and cleared on silence→speech.
#[derive(Debug, Clone, Copy)]
pub struct VoiceActivity {
    /// Normalized signal level (0.0 = silence, 1.0 = full amplitude).
    pub level: f32,
    /// Whether this frame crossed the speech threshold.
    pub is_speech: bool,
    /// When the current silence run began, if in one.
    pub silence_started_at: Option<Instant>,
    /// Milliseconds elapsed since the silence run began (0 during speech).
    pub silence_ms: u32,
}

/// Voice activity detector.
pub struct Vad<C: Clock = SystemClock> {
    config: VadConfig,
    was_speech: bool,
    silence_started_at: Option<Instant>,
    clock: C,
}

impl<C: Clock> Vad<C> {
    /// Creates a new VAD instance with the given configuration and clock.
    pub fn with_clock(config: VadConfig, clock: C) -> Self {
        Self {
            config,
            was_speech: false,
            silence_started_at: None,
            clock,
        }
    }

    /// Processes one frame of audio samples and returns the updated state.
    ///
    /// # Arguments
    /// * `samples` - Audio samples as 16-bit PCM, mono
    pub fn process(&mut self, samples: &[i16]) -> VoiceActivity {
        let level = calculate_rms(samples);
        let is_speech = level > self.config.speech_threshold;
        let now = self.clock.now();

        if is_speech {
            self.silence_started_at = None;
        } else if self.was_speech || self.silence_started_at.is_none() {
            // speech→silence transition, or very first frame of the session
            if self.silence_started_at.is_none() {
                self.silence_started_at = Some(now);
            }
        }
        self.was_speech = is_speech;

        let silence_ms = self
            .silence_started_at
            .map(|start| now.duration_since(start).as_millis() as u32)
            .unwrap_or(0);

        VoiceActivity {
            level,
            is_speech,
            silence_started_at: self.silence_started_at,
            silence_ms,
        }
    }

    /// Resets silence tracking. Called whenever a turn closes.
    pub fn reset(&mut self) {
        self.was_speech = false;
        self.silence_started_at = None;
    }

    /// Updates the speech threshold without resetting state.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.config.speech_threshold = threshold;
    }

    /// Returns the current speech threshold.
    pub fn threshold(&self) -> f32 {
        self.config.speech_threshold
    }
}

impl Vad<SystemClock> {
    /// Creates a new VAD instance with the given configuration using the system clock.
    pub fn new(config: VadConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Arguments
/// * `samples` - Audio samples as 16-bit PCM
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
