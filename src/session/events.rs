//! Session status events for the UI layer.
//!
//! The engine never talks to a UI directly; it emits serializable events on
//! a non-blocking channel. A slow or absent consumer costs nothing — events
//! are dropped, never awaited.

use serde::Serialize;

/// Top-level session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Listening,
    StreamingResponse,
    Speaking,
}

/// Events the engine exposes to the (out-of-scope) UI layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved to a new state.
    State { state: SessionState },
    /// A new turn began recording.
    TurnStarted { turn_id: u64 },
    /// An in-progress transcript for the current turn.
    Partial { turn_id: u64, text: String },
    /// The turn finalized with this transcript.
    TurnFinalized { turn_id: u64, text: String },
    /// A newer turn superseded this one; its response will be discarded.
    TurnSuperseded { turn_id: u64 },
    /// The dialogue reply for a turn (full text once assembled).
    Reply { turn_id: u64, text: String },
    /// Reply playback finished; capture resumes shortly.
    PlaybackDone { turn_id: u64 },
    /// Per-frame input level for meters/orbs.
    Level { level: f32, is_speech: bool },
    /// Human-readable status text (including turn-local errors).
    Status { message: String },
}

/// Non-blocking sender for session events.
///
/// `send` uses `try_send` and silently drops on a full or disconnected
/// channel: the engine's timing must never depend on the UI.
#[derive(Clone, Default)]
pub struct EventSender {
    tx: Option<crossbeam_channel::Sender<SessionEvent>>,
}

impl EventSender {
    /// Creates a sender that forwards to `tx`.
    pub fn new(tx: crossbeam_channel::Sender<SessionEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Creates a sender that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emits an event if anyone is listening.
    pub fn send(&self, event: SessionEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.try_send(event);
        }
    }
}
