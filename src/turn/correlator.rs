//! Request correlation: at most one turn is current at any instant.
//!
//! One producer (the local session) and one logical consumer, so a single
//! atomic current-id field is enough — no locks, no coordination protocol.
//! Every response path checks its turn id against this field before touching
//! conversation state; a stale id means the response is dropped.

use crate::turn::types::TurnId;
use std::sync::atomic::{AtomicU64, Ordering};

/// No turn in flight.
const NONE: u64 = 0;

/// Correlates turn-tagged responses with the turn that produced them.
pub struct TurnCorrelator {
    /// Id of the current turn, or [`NONE`].
    current: AtomicU64,
    /// Source for the next turn id. Ids start at 1 so 0 can mean "none".
    next_id: AtomicU64,
}

impl TurnCorrelator {
    /// Creates a correlator with no current turn.
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(NONE),
            next_id: AtomicU64::new(1),
        }
    }

    /// Begins a new turn, superseding whatever was current.
    ///
    /// Any response still in flight for the previous turn will fail its
    /// `accepts` check and be discarded.
    pub fn begin_turn(&self) -> TurnId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.current.store(id, Ordering::SeqCst);
        TurnId(id)
    }

    /// The current turn id, if a turn is in flight.
    pub fn current(&self) -> Option<TurnId> {
        match self.current.load(Ordering::SeqCst) {
            NONE => None,
            id => Some(TurnId(id)),
        }
    }

    /// Whether a response tagged with `id` may be applied to conversation
    /// state. False for superseded and cleared turns.
    pub fn accepts(&self, id: TurnId) -> bool {
        self.current.load(Ordering::SeqCst) == id.0
    }

    /// Clears the current turn once its response has been spoken.
    ///
    /// Compare-and-swap so that clearing turn N cannot stomp a turn N+1 that
    /// began concurrently.
    pub fn complete(&self, id: TurnId) -> bool {
        self.current
            .compare_exchange(id.0, NONE, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Marks `id` superseded without starting a new turn (explicit stop).
    pub fn supersede(&self, id: TurnId) -> bool {
        self.complete(id)
    }
}

impl Default for TurnCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_no_current_turn() {
        let correlator = TurnCorrelator::new();
        assert!(correlator.current().is_none());
        assert!(!correlator.accepts(TurnId(1)));
    }

    #[test]
    fn test_begin_turn_makes_it_current() {
        let correlator = TurnCorrelator::new();
        let id = correlator.begin_turn();
        assert_eq!(correlator.current(), Some(id));
        assert!(correlator.accepts(id));
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let correlator = TurnCorrelator::new();
        let a = correlator.begin_turn();
        let b = correlator.begin_turn();
        let c = correlator.begin_turn();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_new_turn_supersedes_previous() {
        let correlator = TurnCorrelator::new();
        let first = correlator.begin_turn();
        let second = correlator.begin_turn();

        assert!(!correlator.accepts(first));
        assert!(correlator.accepts(second));
    }

    #[test]
    fn test_current_equals_last_of_n_turns_and_all_prior_discarded() {
        let correlator = TurnCorrelator::new();
        let ids: Vec<TurnId> = (0..20).map(|_| correlator.begin_turn()).collect();

        let last = *ids.last().unwrap();
        assert_eq!(correlator.current(), Some(last));
        for &stale in &ids[..ids.len() - 1] {
            assert!(!correlator.accepts(stale), "stale {} accepted", stale);
        }
        assert!(correlator.accepts(last));
    }

    #[test]
    fn test_complete_clears_current() {
        let correlator = TurnCorrelator::new();
        let id = correlator.begin_turn();
        assert!(correlator.complete(id));
        assert!(correlator.current().is_none());
        assert!(!correlator.accepts(id));
    }

    #[test]
    fn test_complete_of_stale_turn_is_noop() {
        let correlator = TurnCorrelator::new();
        let first = correlator.begin_turn();
        let second = correlator.begin_turn();

        // Late completion of the superseded turn must not clear the new one
        assert!(!correlator.complete(first));
        assert_eq!(correlator.current(), Some(second));
    }

    #[test]
    fn test_concurrent_begin_and_stale_complete() {
        use std::sync::Arc;

        let correlator = Arc::new(TurnCorrelator::new());
        let stale = correlator.begin_turn();

        let c = Arc::clone(&correlator);
        let handle = std::thread::spawn(move || c.begin_turn());
        let fresh = handle.join().unwrap();

        // A late complete for the stale turn races the fresh turn and loses
        correlator.complete(stale);
        assert_eq!(correlator.current(), Some(fresh));
    }
}
