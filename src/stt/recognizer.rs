//! Streaming transcription client.
//!
//! A [`Recognizer`] opens one duplex stream per turn: captured PCM frames go
//! out, partial and final [`TranscriptEvent`]s come back, each tagged with
//! the turn id it was opened for. The engine never retries a stream
//! mid-turn — partial transcript state on the far side would be inconsistent
//! — so a transport failure abandons the turn.

use crate::error::{Result, VoxloopError};
use crate::turn::types::{TranscriptEvent, TurnId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;

/// Outbound audio frames buffered toward the backend.
///
/// Capture produces ~50 frames/second; a backend that falls this far behind
/// is not keeping up with real time and the turn is lost anyway.
const AUDIO_BUFFER_FRAMES: usize = 256;

/// Stream-open configuration. Negotiated once; never renegotiated per-frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    pub sample_rate: u32,
    pub language: String,
    /// Vocabulary hints (proper nouns, domain terms).
    pub vocabulary: Vec<String>,
    /// Ask for punctuated, formatted transcripts.
    pub punctuate: bool,
    /// Silence-threshold hint for backends that do their own endpointing.
    pub silence_hint_ms: Option<u32>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            language: "en".to_string(),
            vocabulary: Vec::new(),
            punctuate: true,
            silence_hint_ms: None,
        }
    }
}

/// Encode PCM samples to the little-endian 16-bit wire format.
pub fn encode_pcm16_le(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Backend for speech recognition.
///
/// Implementations wire the returned stream's channel endpoints to whatever
/// transport the provider speaks (streaming HTTP, duplex socket, in-process
/// model). The engine only sees this trait.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Opens a duplex stream for one turn.
    ///
    /// # Errors
    /// `Stream` when the transport cannot be established.
    async fn open_stream(&self, turn_id: TurnId, options: &StreamOptions)
    -> Result<RecognizerStream>;
}

/// The engine's half of one per-turn duplex stream.
pub struct RecognizerStream {
    turn_id: TurnId,
    /// Dropped on close; the backend task sees the channel end and shuts down.
    audio_tx: Option<mpsc::Sender<Vec<u8>>>,
    events_rx: mpsc::UnboundedReceiver<TranscriptEvent>,
}

/// The backend's half, produced alongside [`RecognizerStream`].
pub struct StreamBackend {
    pub turn_id: TurnId,
    /// PCM16-LE frames from the engine. `None` from `recv` means the stream closed.
    pub audio_rx: mpsc::Receiver<Vec<u8>>,
    /// Transcript events toward the engine. Unbounded: results are small and
    /// must never be dropped for backpressure.
    pub events_tx: mpsc::UnboundedSender<TranscriptEvent>,
}

impl RecognizerStream {
    /// Creates a connected stream/backend pair for `turn_id`.
    pub fn channel(turn_id: TurnId) -> (Self, StreamBackend) {
        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_BUFFER_FRAMES);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        (
            Self {
                turn_id,
                audio_tx: Some(audio_tx),
                events_rx,
            },
            StreamBackend {
                turn_id,
                audio_rx,
                events_tx,
            },
        )
    }

    /// The turn this stream was opened for.
    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    /// Sends one frame of audio, encoded PCM16 little-endian.
    ///
    /// # Errors
    /// `Stream` when the stream is closed, the backend has gone away, or the
    /// outbound buffer is full (the backend is not keeping up with real time
    /// — unbounded buffering here would hide a dead connection).
    pub fn send_audio(&mut self, samples: &[i16]) -> Result<()> {
        let tx = self.audio_tx.as_ref().ok_or_else(|| VoxloopError::Stream {
            message: format!("{}: stream already closed", self.turn_id),
        })?;

        tx.try_send(encode_pcm16_le(samples))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => VoxloopError::Stream {
                    message: format!("{}: outbound audio buffer full", self.turn_id),
                },
                mpsc::error::TrySendError::Closed(_) => VoxloopError::Stream {
                    message: format!("{}: transport dropped", self.turn_id),
                },
            })
    }

    /// Returns the next pending transcript event without waiting.
    pub fn try_next_event(&mut self) -> Option<TranscriptEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Waits for the next transcript event; `None` once the backend is done.
    pub async fn next_event(&mut self) -> Option<TranscriptEvent> {
        self.events_rx.recv().await
    }

    /// Closes the outbound side. Late inbound events may still arrive and are
    /// tolerated; the correlator discards them if the turn moved on.
    pub fn close(&mut self) {
        self.audio_tx = None;
    }
}

/// One scripted response step for [`MockRecognizer`].
#[derive(Debug, Clone)]
struct ScriptedEvent {
    /// Emit after this many audio frames have been received.
    after_frames: usize,
    text: String,
    is_final: bool,
}

/// Mock recognizer for testing.
///
/// Replays a scripted sequence of partial/final transcripts, keyed by how
/// many audio frames have arrived. Per-stream scripts (consumed in order,
/// one per `open_stream`) take precedence over the shared script, letting a
/// test give each turn its own transcript.
#[derive(Debug, Clone, Default)]
pub struct MockRecognizer {
    script: Vec<ScriptedEvent>,
    stream_scripts: Arc<StdMutex<VecDeque<Vec<ScriptedEvent>>>>,
    fail_on_open: bool,
}

impl MockRecognizer {
    /// Creates a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a partial transcript emitted once `after_frames` frames arrived.
    pub fn with_partial(mut self, after_frames: usize, text: &str) -> Self {
        self.script.push(ScriptedEvent {
            after_frames,
            text: text.to_string(),
            is_final: false,
        });
        self
    }

    /// Adds the final transcript emitted once `after_frames` frames arrived.
    pub fn with_final(mut self, after_frames: usize, text: &str) -> Self {
        self.script.push(ScriptedEvent {
            after_frames,
            text: text.to_string(),
            is_final: true,
        });
        self
    }

    /// Queues a script for the next opened stream: `(after_frames, text,
    /// is_final)` triples. Streams consume queued scripts in open order and
    /// fall back to the shared script when the queue is empty.
    pub fn with_stream_script(self, events: &[(usize, &str, bool)]) -> Self {
        let script: Vec<ScriptedEvent> = events
            .iter()
            .map(|(after_frames, text, is_final)| ScriptedEvent {
                after_frames: *after_frames,
                text: text.to_string(),
                is_final: *is_final,
            })
            .collect();
        if let Ok(mut queue) = self.stream_scripts.lock() {
            queue.push_back(script);
        }
        self
    }

    /// Configure the mock to fail on stream open.
    pub fn with_open_failure(mut self) -> Self {
        self.fail_on_open = true;
        self
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn open_stream(
        &self,
        turn_id: TurnId,
        _options: &StreamOptions,
    ) -> Result<RecognizerStream> {
        if self.fail_on_open {
            return Err(VoxloopError::Stream {
                message: "mock transport refused".to_string(),
            });
        }

        let (stream, mut backend) = RecognizerStream::channel(turn_id);
        let mut script = self
            .stream_scripts
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| self.script.clone());
        script.sort_by_key(|e| e.after_frames);

        tokio::spawn(async move {
            let mut frames_seen = 0usize;
            let mut next = 0usize;

            while let Some(_frame) = backend.audio_rx.recv().await {
                frames_seen += 1;
                while next < script.len() && script[next].after_frames <= frames_seen {
                    let event = TranscriptEvent {
                        turn_id: backend.turn_id,
                        text: script[next].text.clone(),
                        is_final: script[next].is_final,
                    };
                    if backend.events_tx.send(event).is_err() {
                        return;
                    }
                    next += 1;
                }
            }

            // Stream closed: flush whatever the script still holds, the way a
            // real backend delivers its final result after end-of-audio.
            while next < script.len() {
                let event = TranscriptEvent {
                    turn_id: backend.turn_id,
                    text: script[next].text.clone(),
                    is_final: script[next].is_final,
                };
                if backend.events_tx.send(event).is_err() {
                    return;
                }
                next += 1;
            }
        });

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pcm16_le() {
        let samples = [0i16, 1, -1, i16::MAX, i16::MIN];
        let bytes = encode_pcm16_le(&samples);
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[0..2], &[0x00, 0x00]);
        assert_eq!(&bytes[2..4], &[0x01, 0x00]);
        assert_eq!(&bytes[4..6], &[0xff, 0xff]);
        assert_eq!(&bytes[6..8], &[0xff, 0x7f]);
        assert_eq!(&bytes[8..10], &[0x00, 0x80]);
    }

    #[tokio::test]
    async fn test_mock_emits_scripted_events_in_order() {
        let recognizer = MockRecognizer::new()
            .with_partial(1, "what")
            .with_partial(2, "what time")
            .with_final(3, "What time is it?");

        let mut stream = recognizer
            .open_stream(TurnId(1), &StreamOptions::default())
            .await
            .unwrap();

        for _ in 0..3 {
            stream.send_audio(&[0i16; 320]).unwrap();
        }

        let first = stream.next_event().await.unwrap();
        assert_eq!(first.text, "what");
        assert!(!first.is_final);
        assert_eq!(first.turn_id, TurnId(1));

        let second = stream.next_event().await.unwrap();
        assert_eq!(second.text, "what time");

        let last = stream.next_event().await.unwrap();
        assert_eq!(last.text, "What time is it?");
        assert!(last.is_final);
    }

    #[tokio::test]
    async fn test_close_flushes_remaining_script() {
        let recognizer = MockRecognizer::new().with_final(100, "late final");
        let mut stream = recognizer
            .open_stream(TurnId(2), &StreamOptions::default())
            .await
            .unwrap();

        stream.send_audio(&[0i16; 320]).unwrap();
        stream.close();

        let event = stream.next_event().await.unwrap();
        assert_eq!(event.text, "late final");
        assert!(event.is_final);
        // Channel ends after the flush
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_close_is_stream_error() {
        let recognizer = MockRecognizer::new();
        let mut stream = recognizer
            .open_stream(TurnId(3), &StreamOptions::default())
            .await
            .unwrap();

        stream.close();
        let err = stream.send_audio(&[0i16; 10]).unwrap_err();
        assert!(matches!(err, VoxloopError::Stream { .. }));
    }

    #[tokio::test]
    async fn test_open_failure() {
        let recognizer = MockRecognizer::new().with_open_failure();
        let result = recognizer
            .open_stream(TurnId(4), &StreamOptions::default())
            .await;
        assert!(matches!(result, Err(VoxloopError::Stream { .. })));
    }

    #[tokio::test]
    async fn test_full_outbound_buffer_is_stream_error() {
        // Backend that never reads: keep the pair alive but idle
        let (mut stream, _backend) = RecognizerStream::channel(TurnId(5));

        let mut saw_error = false;
        for _ in 0..(AUDIO_BUFFER_FRAMES + 1) {
            if stream.send_audio(&[0i16; 320]).is_err() {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error, "outbound buffer should refuse unbounded growth");
    }

    #[tokio::test]
    async fn test_per_stream_scripts_consumed_in_order() {
        let recognizer = MockRecognizer::new()
            .with_stream_script(&[(1, "First question.", true)])
            .with_stream_script(&[(1, "Second question.", true)]);

        for (turn, expected) in [(1u64, "First question."), (2, "Second question.")] {
            let mut stream = recognizer
                .open_stream(TurnId(turn), &StreamOptions::default())
                .await
                .unwrap();
            stream.send_audio(&[0i16; 320]).unwrap();
            let event = stream.next_event().await.unwrap();
            assert_eq!(event.text, expected);
            assert_eq!(event.turn_id, TurnId(turn));
        }
    }

    #[tokio::test]
    async fn test_events_carry_opening_turn_id() {
        let recognizer = MockRecognizer::new().with_final(1, "hello.");
        let mut stream = recognizer
            .open_stream(TurnId(9), &StreamOptions::default())
            .await
            .unwrap();

        stream.send_audio(&[0i16; 320]).unwrap();
        let event = stream.next_event().await.unwrap();
        assert_eq!(event.turn_id, TurnId(9));
    }
}
