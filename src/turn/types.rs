//! Data types for the turn lifecycle.

use std::fmt;
use std::time::Instant;

/// Opaque identifier for one user utterance cycle.
///
/// Monotonically increasing per session; a larger id always means a newer
/// attempt, which is what lets the correlator discard stale responses with a
/// single comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Lifecycle state of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Accumulating audio frames and transcript events.
    Recording,
    /// End of speech detected, waiting for the final transcript.
    Finalizing,
    /// Transcript handed to the dialogue backend.
    AwaitingResponse,
    /// A newer turn started; any late response is discarded.
    Superseded,
}

/// One user utterance cycle from start-of-speech to the system's reply.
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: TurnId,
    pub state: TurnState,
    /// Latest transcript for this turn (partials overwrite, finals stick).
    pub transcript: String,
    pub started_at: Instant,
    pub frame_count: u64,
    /// Set once a final transcript event has arrived.
    has_final: bool,
}

impl Turn {
    /// Creates a new turn in the recording state.
    pub fn new(id: TurnId, started_at: Instant) -> Self {
        Self {
            id,
            state: TurnState::Recording,
            transcript: String::new(),
            started_at,
            frame_count: 0,
            has_final: false,
        }
    }

    /// Records a transcript event for this turn.
    ///
    /// Partials overwrite each other; a final sticks, and stray partials
    /// arriving after it (recognizers flushing on close) change nothing.
    pub fn observe_transcript(&mut self, text: &str, is_final: bool) {
        if is_final {
            self.transcript = text.to_string();
            self.has_final = true;
        } else if !self.has_final {
            self.transcript = text.to_string();
        }
    }
}

/// A recognition result tagged with the turn that produced it.
///
/// The tag is what allows stale events to be filtered after a turn is
/// superseded; an untagged event would be unattributable.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    pub turn_id: TurnId,
    pub text: String,
    /// Partials arrive repeatedly; at most one final event per turn.
    pub is_final: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_id_ordering_matches_recency() {
        assert!(TurnId(2) > TurnId(1));
        assert_eq!(TurnId(3), TurnId(3));
    }

    #[test]
    fn test_turn_id_display() {
        assert_eq!(TurnId(7).to_string(), "turn-7");
    }

    #[test]
    fn test_new_turn_starts_recording() {
        let turn = Turn::new(TurnId(1), Instant::now());
        assert_eq!(turn.state, TurnState::Recording);
        assert!(turn.transcript.is_empty());
        assert_eq!(turn.frame_count, 0);
    }

    #[test]
    fn test_partials_overwrite_until_final() {
        let mut turn = Turn::new(TurnId(2), Instant::now());
        turn.observe_transcript("what", false);
        turn.observe_transcript("what time", false);
        assert_eq!(turn.transcript, "what time");

        turn.observe_transcript("What time is it?", true);
        turn.observe_transcript("stray partial", false);
        assert_eq!(turn.transcript, "What time is it?");
    }
}
