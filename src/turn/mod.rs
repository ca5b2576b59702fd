//! Turn lifecycle: segmentation, identity, and response correlation.

pub mod correlator;
pub mod heuristics;
pub mod segmenter;
pub mod types;

pub use correlator::TurnCorrelator;
pub use heuristics::{is_incomplete, required_wait_ms};
pub use segmenter::{EndOfTurn, SegmenterConfig, SegmenterState, TurnSegmenter};
pub use types::{TranscriptEvent, Turn, TurnId, TurnState};
