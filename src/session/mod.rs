//! Session orchestration: the loop gluing capture, segmentation,
//! recognition, dialogue, and playback together.

pub mod events;
pub mod orchestrator;

pub use events::{EventSender, SessionEvent, SessionState};
pub use orchestrator::{Session, SessionConfig, SessionHandle};
