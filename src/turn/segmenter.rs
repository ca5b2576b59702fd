//! Turn segmenter: decides in real time when the speaker has finished.
//!
//! Two-stage design: acoustic silence moves a recording turn to
//! `TentativelyDone`, where the transcript is checked for linguistic
//! completeness. An unfinished-sounding transcript sends the turn back to
//! `Recording` with a longer required wait, so a mid-thought pause is not a
//! cut-off and a short complete utterance is not a sluggish one.
//!
//! The segmenter is a pure decision machine: the transcript it judges lives
//! on the [`Turn`](crate::turn::types::Turn) and is passed in per frame.

use crate::defaults;
use crate::turn::heuristics::{is_incomplete, required_wait_ms, word_count};

/// Configuration for turn segmentation.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Base silence before a turn is tentatively done (ms).
    pub base_silence_ms: u32,
    /// Wait extension per ten transcript words (ms).
    pub silence_step_ms: u32,
    /// Upper bound on the extended wait (ms).
    pub silence_cap_ms: u32,
    /// Silence after which the turn finalizes even if the transcript still
    /// reads as incomplete. The speaker has clearly stopped; holding the
    /// turn open forever would deadlock the conversation.
    pub hard_silence_cap_ms: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            base_silence_ms: defaults::BASE_SILENCE_MS,
            silence_step_ms: defaults::SILENCE_STEP_MS,
            silence_cap_ms: defaults::SILENCE_CAP_MS,
            hard_silence_cap_ms: defaults::SILENCE_CAP_MS * 2,
        }
    }
}

/// Segmentation state for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// No turn open; frames are ignored.
    Idle,
    /// Accumulating frames and transcript events.
    Recording,
    /// Silence threshold reached; completeness check pending.
    TentativelyDone,
    /// End of turn emitted; frames for this turn are no longer consumed.
    Finalized,
}

/// Emitted exactly once per turn when segmentation decides it is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfTurn {
    /// The transcript at finalization time, trimmed.
    pub transcript: String,
}

/// Turn segmenter state machine.
pub struct TurnSegmenter {
    config: SegmenterConfig,
    state: SegmenterState,
    /// Silence currently required before tentatively closing (ms).
    required_wait_ms: u32,
}

impl TurnSegmenter {
    /// Creates a new segmenter in the idle state.
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            state: SegmenterState::Idle,
            required_wait_ms: config.base_silence_ms,
        }
    }

    /// Returns the current segmentation state.
    pub fn state(&self) -> SegmenterState {
        self.state
    }

    /// The silence currently required before the turn tentatively closes (ms).
    pub fn required_wait(&self) -> u32 {
        self.required_wait_ms
    }

    /// Opens a new turn. Idle → Recording.
    pub fn begin_turn(&mut self) {
        self.state = SegmenterState::Recording;
        self.required_wait_ms = self.config.base_silence_ms;
    }

    /// Feeds one frame's VAD verdict together with the turn's current
    /// transcript. Returns the end-of-turn event when the turn finalizes;
    /// `None` otherwise.
    ///
    /// # Arguments
    /// * `transcript` - the turn's accumulated transcript so far
    /// * `is_speech` - VAD classification of the frame
    /// * `silence_ms` - length of the current silence run (0 during speech)
    pub fn feed(
        &mut self,
        transcript: &str,
        is_speech: bool,
        silence_ms: u32,
    ) -> Option<EndOfTurn> {
        match self.state {
            SegmenterState::Idle | SegmenterState::Finalized => None,
            SegmenterState::Recording => {
                if is_speech || silence_ms < self.required_wait_ms {
                    return None;
                }

                // The completeness check runs on the next frame, giving a
                // straggling final transcript one frame to land
                self.state = SegmenterState::TentativelyDone;
                None
            }
            SegmenterState::TentativelyDone => {
                if is_speech {
                    // Speaker kept going after all
                    self.state = SegmenterState::Recording;
                    return None;
                }

                self.evaluate(transcript, silence_ms)
            }
        }
    }

    /// Completeness check in `TentativelyDone`.
    fn evaluate(&mut self, transcript: &str, silence_ms: u32) -> Option<EndOfTurn> {
        let exhausted = silence_ms >= self.config.hard_silence_cap_ms;

        if !exhausted && is_incomplete(transcript) {
            // Mid-thought: go back to recording with a longer wait so the
            // speaker earns more trailing tolerance.
            self.state = SegmenterState::Recording;
            self.required_wait_ms = required_wait_ms(
                word_count(transcript),
                self.config.base_silence_ms + self.config.silence_step_ms,
                self.config.silence_step_ms,
                self.config.silence_cap_ms,
            );
            return None;
        }

        self.state = SegmenterState::Finalized;
        Some(EndOfTurn {
            transcript: transcript.trim().to_string(),
        })
    }

    /// Discards the current turn and returns to idle.
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.required_wait_ms = self.config.base_silence_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> SegmenterConfig {
        SegmenterConfig {
            base_silence_ms: 2000,
            silence_step_ms: 200,
            silence_cap_ms: 3500,
            hard_silence_cap_ms: 7000,
        }
    }

    #[test]
    fn test_idle_ignores_frames() {
        let mut seg = TurnSegmenter::new(make_config());
        assert_eq!(seg.state(), SegmenterState::Idle);
        assert!(seg.feed("anything", true, 0).is_none());
        assert_eq!(seg.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_begin_turn_starts_recording() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();
        assert_eq!(seg.state(), SegmenterState::Recording);
        assert_eq!(seg.required_wait(), 2000);
    }

    #[test]
    fn test_complete_transcript_finalizes_at_base_wait() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();
        let text = "What is on my calendar today?";

        assert!(seg.feed(text, true, 0).is_none());
        assert!(seg.feed(text, false, 1500).is_none());

        // Base wait reached: tentatively done, evaluated on the next frame
        assert!(seg.feed(text, false, 2000).is_none());
        assert_eq!(seg.state(), SegmenterState::TentativelyDone);

        let end = seg.feed(text, false, 2020).expect("should finalize");
        assert_eq!(end.transcript, "What is on my calendar today?");
        assert_eq!(seg.state(), SegmenterState::Finalized);
    }

    #[test]
    fn test_finalizes_exactly_once() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();

        assert!(seg.feed("All done.", false, 2000).is_none());
        assert!(seg.feed("All done.", false, 2100).is_some());
        // Further frames for this turn are not consumed
        assert!(seg.feed("All done.", false, 3000).is_none());
        assert!(seg.feed("All done.", true, 0).is_none());
    }

    #[test]
    fn test_incomplete_transcript_extends_wait() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();
        // 6 words ending in an article: incomplete
        let partial = "I wanted to talk about the";

        // Base wait elapses → tentatively done → judged incomplete → back to
        // recording with an extended wait
        assert!(seg.feed(partial, false, 2000).is_none());
        assert!(seg.feed(partial, false, 2050).is_none());
        assert_eq!(seg.state(), SegmenterState::Recording);
        assert!(seg.required_wait() > 2000);

        // Transcript unchanged: still not finalized even after the extended wait
        let wait = seg.required_wait();
        assert!(seg.feed(partial, false, wait).is_none());
        assert!(seg.feed(partial, false, wait + 50).is_none());
        assert_ne!(seg.state(), SegmenterState::Finalized);

        // Speaker finishes the thought; completion now finalizes
        let complete = "I wanted to talk about the pricing.";
        seg.feed(complete, true, 0);
        let wait = seg.required_wait();
        assert!(seg.feed(complete, false, wait).is_none());
        let end = seg
            .feed(complete, false, wait + 50)
            .expect("should finalize");
        assert_eq!(end.transcript, "I wanted to talk about the pricing.");
    }

    #[test]
    fn test_extended_wait_scales_with_word_count() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();
        let long = "one two three four five six seven eight nine ten \
                    eleven twelve thirteen fourteen fifteen sixteen seventeen \
                    eighteen nineteen twenty and";

        assert!(seg.feed(long, false, 2000).is_none());
        assert!(seg.feed(long, false, 2050).is_none());
        // 21 words → (base + step) extended by floor(21/10)·step
        assert_eq!(seg.required_wait(), 2600);
    }

    #[test]
    fn test_extended_wait_never_exceeds_cap() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();
        let very_long = ["word"; 300].join(" ") + " and";

        assert!(seg.feed(&very_long, false, 2000).is_none());
        assert!(seg.feed(&very_long, false, 2050).is_none());
        assert_eq!(seg.required_wait(), 3500);
    }

    #[test]
    fn test_speech_resumption_returns_to_recording() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();

        assert!(seg.feed("what I meant to", false, 2000).is_none());
        assert_eq!(seg.state(), SegmenterState::TentativelyDone);

        assert!(seg.feed("what I meant to", true, 0).is_none());
        assert_eq!(seg.state(), SegmenterState::Recording);
    }

    #[test]
    fn test_hard_cap_finalizes_incomplete_transcript() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();
        let partial = "I wanted to talk about the";

        assert!(seg.feed(partial, false, 2000).is_none());
        assert!(seg.feed(partial, false, 2100).is_none());
        assert!(seg.feed(partial, false, 4000).is_none());
        assert!(seg.feed(partial, false, 4100).is_none());
        // The speaker has clearly stopped; give up waiting for completion
        assert!(seg.feed(partial, false, 7000).is_none());
        let end = seg
            .feed(partial, false, 7100)
            .expect("hard cap should finalize");
        assert_eq!(end.transcript, "I wanted to talk about the");
    }

    #[test]
    fn test_reset_discards_turn() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();
        seg.feed("half a", false, 2000);
        seg.reset();

        assert_eq!(seg.state(), SegmenterState::Idle);
        assert_eq!(seg.required_wait(), 2000);
        assert!(seg.feed("half a", false, 5000).is_none());
    }

    #[test]
    fn test_empty_transcript_waits_for_hard_cap() {
        let mut seg = TurnSegmenter::new(make_config());
        seg.begin_turn();

        // VAD opened a turn on noise but the recognizer produced nothing
        assert!(seg.feed("", false, 2500).is_none());
        assert!(seg.feed("", false, 2600).is_none());
        assert!(seg.feed("", false, 7000).is_none());
        let end = seg.feed("", false, 7100).expect("hard cap should close");
        assert!(end.transcript.is_empty());
    }
}
