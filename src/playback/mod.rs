//! Gapless scheduling of synthesized reply audio.

pub mod scheduler;

pub use scheduler::{PlaybackScheduler, PlayHead, ScheduledSegment, SchedulerConfig};
