//! Playback scheduler: strictly sequential, non-overlapping, gapless.
//!
//! Synthesized chunks arrive asynchronously, in bursts, with jitter. A
//! single mutable play-head cursor marks the next available start time;
//! every chunk starts at `max(play_head, now + lead)` and advances the
//! cursor by its own duration, so chunks can never overlap and never leave
//! a gap beyond the initial lead.

use crate::audio::output::AudioOutput;
use crate::audio::resample::resample;
use crate::audio::vad::{Clock, SystemClock};
use crate::defaults;
use crate::error::Result;
use crate::synth::SynthesizedAudio;
use std::time::{Duration, Instant};

/// Configuration for playback scheduling.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Minimum lookahead between "now" and a scheduled start.
    pub lead: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lead: Duration::from_millis(defaults::PLAYBACK_LEAD_MS as u64),
        }
    }
}

/// The interval a chunk was scheduled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSegment {
    pub start: Instant,
    pub end: Instant,
}

impl ScheduledSegment {
    /// Playback duration of this segment.
    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.start)
    }
}

/// The play-head cursor: next available playback start time.
#[derive(Debug, Clone, Copy)]
pub struct PlayHead {
    cursor: Option<Instant>,
    lead: Duration,
}

impl PlayHead {
    /// Creates an unpositioned play-head with the given lead.
    pub fn new(lead: Duration) -> Self {
        Self { cursor: None, lead }
    }

    /// Schedules a chunk of `duration` as seen from `now`.
    ///
    /// Start is `max(cursor, now + lead)`; the cursor advances to the chunk's
    /// end. A cursor in the past (playback drained while no chunk was queued)
    /// snaps forward rather than scheduling into history.
    pub fn schedule(&mut self, now: Instant, duration: Duration) -> ScheduledSegment {
        let earliest = now + self.lead;
        let start = match self.cursor {
            Some(cursor) if cursor > earliest => cursor,
            _ => earliest,
        };
        let end = start + duration;
        self.cursor = Some(end);
        ScheduledSegment { start, end }
    }

    /// When the last scheduled chunk finishes, if anything was scheduled.
    pub fn end(&self) -> Option<Instant> {
        self.cursor
    }

    /// Forgets all scheduled time (explicit stop).
    pub fn reset(&mut self) {
        self.cursor = None;
    }
}

/// Schedules synthesized chunks onto an output device.
///
/// Rate alignment is unconditional: a chunk whose sample rate differs from
/// the device's is resampled before scheduling, because playing it raw would
/// silently shift pitch and speed.
pub struct PlaybackScheduler<C: Clock = SystemClock> {
    output: Box<dyn AudioOutput>,
    play_head: PlayHead,
    clock: C,
}

impl PlaybackScheduler<SystemClock> {
    /// Creates a scheduler over `output` using the system clock.
    pub fn new(config: SchedulerConfig, output: Box<dyn AudioOutput>) -> Self {
        Self::with_clock(config, output, SystemClock)
    }
}

impl<C: Clock> PlaybackScheduler<C> {
    /// Creates a scheduler with an injectable clock.
    pub fn with_clock(config: SchedulerConfig, output: Box<dyn AudioOutput>, clock: C) -> Self {
        Self {
            output,
            play_head: PlayHead::new(config.lead),
            clock,
        }
    }

    /// Starts the output device.
    pub fn start(&mut self) -> Result<()> {
        self.output.start()
    }

    /// Enqueues one chunk for gapless playback.
    ///
    /// Returns the interval it was scheduled into.
    pub fn enqueue(&mut self, audio: &SynthesizedAudio) -> Result<ScheduledSegment> {
        let output_rate = self.output.sample_rate();
        let aligned: Vec<i16> = if audio.sample_rate == output_rate {
            audio.samples.clone()
        } else {
            resample(&audio.samples, audio.sample_rate, output_rate)
        };

        let duration = Duration::from_secs_f64(aligned.len() as f64 / output_rate as f64);
        let segment = self.play_head.schedule(self.clock.now(), duration);
        self.output.write(&aligned)?;
        Ok(segment)
    }

    /// When everything enqueued so far will have finished playing.
    pub fn finish_time(&self) -> Option<Instant> {
        self.play_head.end()
    }

    /// Remaining playback from `now`, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let end = self.play_head.end()?;
        let now = self.clock.now();
        (end > now).then(|| end.duration_since(now))
    }

    /// Discards pending segments and stops the device (explicit stop).
    pub fn clear(&mut self) -> Result<()> {
        self.play_head.reset();
        self.output.stop()
    }
}
