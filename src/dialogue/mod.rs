//! Dialogue responder contract.
//!
//! The engine does not decide what to say. It hands the finalized turn text
//! and conversation history to an external responder and consumes the reply
//! as an ordered sequence of chunks — a synchronous backend is simply one
//! final chunk, a streaming backend many. Either way the chunks are one
//! logical turn response, tagged with the turn that asked.

use crate::error::{Result, VoxloopError};
use crate::synth::SynthesizedAudio;
use crate::turn::types::TurnId;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One user/assistant exchange in the conversation log.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Exchange {
    pub user: String,
    pub reply: String,
}

/// A finalized turn handed to the responder.
#[derive(Debug, Clone)]
pub struct DialogueRequest {
    pub turn_id: TurnId,
    pub turn_text: String,
    pub history: Vec<Exchange>,
}

/// One ordered piece of the reply.
#[derive(Debug, Clone)]
pub struct ReplyChunk {
    pub turn_id: TurnId,
    pub text: String,
    /// Reply audio delivered out-of-band by the backend, bypassing synthesis.
    pub audio: Option<SynthesizedAudio>,
    /// Set on the last chunk of the logical response.
    pub is_final: bool,
}

/// Ordered reply chunks for one turn.
pub struct ReplyStream {
    rx: mpsc::Receiver<ReplyChunk>,
}

impl ReplyStream {
    /// Creates a connected stream/sender pair.
    pub fn channel(buffer: usize) -> (mpsc::Sender<ReplyChunk>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }

    /// Wraps a single complete response as a one-chunk stream.
    pub fn single(chunk: ReplyChunk) -> Self {
        let (tx, stream) = Self::channel(1);
        // Buffer of 1 always has room for the only chunk
        let _ = tx.try_send(ReplyChunk {
            is_final: true,
            ..chunk
        });
        stream
    }

    /// Next chunk, `None` once the response is complete or abandoned.
    pub async fn next_chunk(&mut self) -> Option<ReplyChunk> {
        self.rx.recv().await
    }
}

/// External dialogue backend.
#[async_trait]
pub trait DialogueResponder: Send + Sync {
    /// Produces the reply for one finalized turn.
    ///
    /// # Errors
    /// `Dialogue` when the backend cannot take the request at all; chunk
    /// delivery failures end the stream early instead.
    async fn respond(&self, request: DialogueRequest) -> Result<ReplyStream>;
}

/// Mock responder for testing.
///
/// Echoes a configured reply, optionally split into streamed chunks and
/// optionally delayed — the delay is how tests reproduce a response arriving
/// after its turn has been superseded.
#[derive(Debug, Clone)]
pub struct MockResponder {
    reply: String,
    chunk_words: Option<usize>,
    delay: Option<std::time::Duration>,
    audio: Option<SynthesizedAudio>,
    should_fail: bool,
}

impl MockResponder {
    /// Creates a mock answering every request with `reply` as one final chunk.
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            chunk_words: None,
            delay: None,
            audio: None,
            should_fail: false,
        }
    }

    /// Stream the reply in chunks of `words` words instead of one chunk.
    pub fn with_streaming(mut self, words: usize) -> Self {
        self.chunk_words = Some(words.max(1));
        self
    }

    /// Delay before the first chunk is produced.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attach out-of-band reply audio to the final chunk.
    pub fn with_audio(mut self, audio: SynthesizedAudio) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Configure the mock to fail on respond.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

#[async_trait]
impl DialogueResponder for MockResponder {
    async fn respond(&self, request: DialogueRequest) -> Result<ReplyStream> {
        if self.should_fail {
            return Err(VoxloopError::Dialogue {
                message: "mock responder failure".to_string(),
            });
        }

        let reply = self.reply.clone();
        let chunk_words = self.chunk_words;
        let delay = self.delay;
        let audio = self.audio.clone();
        let turn_id = request.turn_id;

        let (tx, stream) = ReplyStream::channel(16);
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            match chunk_words {
                None => {
                    let _ = tx
                        .send(ReplyChunk {
                            turn_id,
                            text: reply,
                            audio,
                            is_final: true,
                        })
                        .await;
                }
                Some(words) => {
                    let tokens: Vec<&str> = reply.split_whitespace().collect();
                    let chunks: Vec<String> = tokens
                        .chunks(words)
                        .map(|chunk| chunk.join(" "))
                        .collect();
                    let last = chunks.len().saturating_sub(1);

                    for (i, text) in chunks.into_iter().enumerate() {
                        let is_final = i == last;
                        let chunk = ReplyChunk {
                            turn_id,
                            text,
                            audio: if is_final { audio.clone() } else { None },
                            is_final,
                        };
                        if tx.send(chunk).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(stream)
    }
}
