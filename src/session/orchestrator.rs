//! Session orchestrator.
//!
//! Owns the conversational loop: a capture task feeding frames, a session
//! task running VAD + turn segmentation + recognizer I/O, and one short-lived
//! response task per finalized turn. Listening continues during the dialogue
//! wait so a user who speaks again quickly supersedes the in-flight turn;
//! frame processing is suspended while the reply is playing so the engine
//! does not hear itself.

use crate::audio::output::AudioOutput;
use crate::audio::source::{AudioFrame, AudioSource};
use crate::audio::vad::{Vad, VadConfig};
use crate::config::{Config, VoiceConfig};
use crate::defaults;
use crate::dialogue::{DialogueRequest, DialogueResponder, Exchange};
use crate::error::Result;
use crate::playback::{PlaybackScheduler, SchedulerConfig};
use crate::session::events::{EventSender, SessionEvent, SessionState};
use crate::stt::recognizer::{Recognizer, RecognizerStream, StreamOptions};
use crate::synth::Synthesizer;
use crate::turn::correlator::TurnCorrelator;
use crate::turn::segmenter::{EndOfTurn, SegmenterConfig, TurnSegmenter};
use crate::turn::types::{Turn, TurnState};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Consecutive capture read failures tolerated before giving up.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 10;

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub vad: VadConfig,
    pub segmenter: SegmenterConfig,
    pub stream_options: StreamOptions,
    pub voice: VoiceConfig,
    pub scheduler: SchedulerConfig,
    /// Inclusive range the capture-resume delay is drawn from (ms).
    pub resume_delay_ms: (u32, u32),
    /// Capture polling cadence (ms).
    pub frame_ms: u32,
    /// Capture frame channel depth.
    pub frame_buffer: usize,
    /// Backoff after a turn is abandoned on an error.
    pub error_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            segmenter: SegmenterConfig::default(),
            stream_options: StreamOptions::default(),
            voice: VoiceConfig::default(),
            scheduler: SchedulerConfig::default(),
            resume_delay_ms: (defaults::RESUME_DELAY_MIN_MS, defaults::RESUME_DELAY_MAX_MS),
            frame_ms: defaults::FRAME_MS,
            frame_buffer: 64,
            error_backoff: Duration::from_millis(defaults::TURN_ERROR_BACKOFF_MS),
        }
    }
}

impl SessionConfig {
    /// Builds a session configuration from the app config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            vad: VadConfig {
                speech_threshold: config.audio.vad_threshold,
            },
            segmenter: SegmenterConfig {
                base_silence_ms: config.turn.base_silence_ms,
                silence_step_ms: config.turn.silence_step_ms,
                silence_cap_ms: config.turn.silence_cap_ms,
                hard_silence_cap_ms: config.turn.silence_cap_ms.saturating_mul(2),
            },
            stream_options: StreamOptions {
                sample_rate: config.audio.sample_rate,
                language: config.stt.language.clone(),
                vocabulary: config.stt.vocabulary.clone(),
                punctuate: config.stt.punctuate,
                silence_hint_ms: Some(config.turn.base_silence_ms),
            },
            voice: config.voice.clone(),
            scheduler: SchedulerConfig {
                lead: Duration::from_millis(config.playback.lead_ms as u64),
            },
            resume_delay_ms: (
                config.turn.resume_delay_min_ms,
                config.turn.resume_delay_max_ms,
            ),
            ..Self::default()
        }
    }
}

/// A running session.
///
/// Dropping the handle detaches the tasks; call [`SessionHandle::stop`] for
/// an orderly teardown that releases the capture device, closes any open
/// recognizer stream, supersedes the in-flight turn, and discards pending
/// playback.
pub struct SessionHandle {
    running: Arc<AtomicBool>,
    muted: Arc<AtomicBool>,
    correlator: Arc<TurnCorrelator>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    conversation: Arc<Mutex<Vec<Exchange>>>,
    capture_task: JoinHandle<()>,
    session_task: JoinHandle<()>,
}

impl SessionHandle {
    /// Suspends frame forwarding without tearing down the capture device.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    /// Whether frame forwarding is currently suspended.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Whether the session is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the conversation log.
    pub fn conversation(&self) -> Vec<Exchange> {
        self.conversation
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Stops the session and releases every resource.
    pub async fn stop(self) {
        self.running.store(false, Ordering::SeqCst);

        // Cancel the in-flight turn, if any: its response is discarded, not awaited
        if let Some(current) = self.correlator.current() {
            self.correlator.supersede(current);
        }

        // Discard pending playback
        if let Ok(mut scheduler) = self.scheduler.lock() {
            if let Err(e) = scheduler.clear() {
                eprintln!("voxloop: failed to stop playback: {e}");
            }
        }

        if let Err(e) = self.capture_task.await {
            eprintln!("voxloop: capture task panicked: {e}");
        }
        if let Err(e) = self.session_task.await {
            eprintln!("voxloop: session task panicked: {e}");
        }
    }
}

/// Session builder: configuration plus the backends the engine drives.
pub struct Session {
    config: SessionConfig,
    events: EventSender,
}

impl Session {
    /// Creates a session with the given configuration.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            events: EventSender::disabled(),
        }
    }

    /// Sets the status event channel consumed by the UI layer.
    pub fn with_events(mut self, tx: crossbeam_channel::Sender<SessionEvent>) -> Self {
        self.events = EventSender::new(tx);
        self
    }

    /// Starts the session.
    ///
    /// # Arguments
    /// * `source` - capture device (opened here; `DeviceUnavailable` is
    ///   surfaced to the caller without retry)
    /// * `output` - playback device
    /// * `recognizer` - streaming transcription backend
    /// * `responder` - external dialogue backend
    /// * `synthesizer` - optional voice backend for replies without
    ///   out-of-band audio
    pub async fn start(
        self,
        mut source: Box<dyn AudioSource>,
        output: Box<dyn AudioOutput>,
        recognizer: Arc<dyn Recognizer>,
        responder: Arc<dyn DialogueResponder>,
        synthesizer: Option<Arc<dyn Synthesizer>>,
    ) -> Result<SessionHandle> {
        source.start()?;

        let mut scheduler = PlaybackScheduler::new(self.config.scheduler, output);
        scheduler.start()?;
        let scheduler = Arc::new(Mutex::new(scheduler));

        let running = Arc::new(AtomicBool::new(true));
        let muted = Arc::new(AtomicBool::new(false));
        let speaking = Arc::new(AtomicBool::new(false));
        let correlator = Arc::new(TurnCorrelator::new());
        let conversation = Arc::new(Mutex::new(Vec::new()));

        let (frame_tx, frame_rx) = mpsc::channel(self.config.frame_buffer);

        let capture_task = tokio::spawn(capture_loop(
            source,
            frame_tx,
            Arc::clone(&running),
            Arc::clone(&muted),
            self.config.frame_ms,
            self.events.clone(),
        ));

        let session_loop = SessionLoop {
            vad: Vad::new(self.config.vad),
            segmenter: TurnSegmenter::new(self.config.segmenter),
            stream_options: self.config.stream_options.clone(),
            recognizer,
            responder,
            synthesizer,
            scheduler: Arc::clone(&scheduler),
            correlator: Arc::clone(&correlator),
            conversation: Arc::clone(&conversation),
            events: self.events.clone(),
            running: Arc::clone(&running),
            speaking,
            voice: self.config.voice.clone(),
            resume_delay_ms: self.config.resume_delay_ms,
            error_backoff: self.config.error_backoff,
            backoff_until: None,
            stream: None,
            active_turn: None,
        };
        let session_task = tokio::spawn(session_loop.run(frame_rx));

        Ok(SessionHandle {
            running,
            muted,
            correlator,
            scheduler,
            conversation,
            capture_task,
            session_task,
        })
    }
}

/// Dedicated capture task: polls the source at the frame cadence and feeds
/// the session loop. Frames are never dropped while the loop is alive —
/// `send` applies backpressure instead (audio accumulates in the device
/// buffer and arrives in the next read).
async fn capture_loop(
    mut source: Box<dyn AudioSource>,
    frame_tx: mpsc::Sender<AudioFrame>,
    running: Arc<AtomicBool>,
    muted: Arc<AtomicBool>,
    frame_ms: u32,
    events: EventSender,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(frame_ms.max(1) as u64));
    let mut sequence: u64 = 0;
    let mut consecutive_errors: u32 = 0;

    while running.load(Ordering::SeqCst) {
        interval.tick().await;

        let samples = match source.read_samples() {
            Ok(samples) => {
                consecutive_errors = 0;
                samples
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    events.send(SessionEvent::Status {
                        message: format!("audio capture failed repeatedly: {e}"),
                    });
                    break;
                }
                continue;
            }
        };

        if samples.is_empty() {
            // Normal at startup while the device initializes
            continue;
        }

        // Muted: keep draining the device so it stays hot, forward nothing
        if muted.load(Ordering::SeqCst) {
            continue;
        }

        let frame = AudioFrame::new(samples, Instant::now(), sequence);
        sequence += 1;

        if frame_tx.send(frame).await.is_err() {
            break;
        }
    }

    if let Err(e) = source.stop() {
        eprintln!("voxloop: failed to stop capture: {e}");
    }
}

/// The session task: VAD, segmentation, recognizer I/O, turn hand-off.
struct SessionLoop {
    vad: Vad,
    segmenter: TurnSegmenter,
    stream_options: StreamOptions,
    recognizer: Arc<dyn Recognizer>,
    responder: Arc<dyn DialogueResponder>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    correlator: Arc<TurnCorrelator>,
    conversation: Arc<Mutex<Vec<Exchange>>>,
    events: EventSender,
    running: Arc<AtomicBool>,
    speaking: Arc<AtomicBool>,
    voice: VoiceConfig,
    resume_delay_ms: (u32, u32),
    error_backoff: Duration,
    backoff_until: Option<Instant>,
    stream: Option<RecognizerStream>,
    active_turn: Option<Turn>,
}

impl SessionLoop {
    async fn run(mut self, mut frames: mpsc::Receiver<AudioFrame>) {
        self.events.send(SessionEvent::State {
            state: SessionState::Listening,
        });

        let mut was_speaking = false;

        while let Some(frame) = frames.recv().await {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            // Reply audio is playing: suppress the mic so the engine does not
            // segment its own voice into a turn
            if self.speaking.load(Ordering::SeqCst) {
                was_speaking = true;
                continue;
            }
            if was_speaking {
                was_speaking = false;
                self.vad.reset();
            }

            let activity = self.vad.process(&frame.samples);
            self.events.send(SessionEvent::Level {
                level: activity.level,
                is_speech: activity.is_speech,
            });

            if self.active_turn.is_none() {
                if !activity.is_speech {
                    continue;
                }
                if let Some(until) = self.backoff_until {
                    if Instant::now() < until {
                        continue;
                    }
                    self.backoff_until = None;
                }
                self.begin_turn().await;
                if self.active_turn.is_none() {
                    continue;
                }
            }

            if let Some(stream) = self.stream.as_mut() {
                if let Err(e) = stream.send_audio(&frame.samples) {
                    self.abandon_turn(&e.to_string());
                    continue;
                }
            }
            if let Some(turn) = self.active_turn.as_mut() {
                turn.frame_count += 1;
            }

            self.drain_transcripts();

            let transcript = self
                .active_turn
                .as_ref()
                .map(|turn| turn.transcript.clone())
                .unwrap_or_default();
            if let Some(end) =
                self.segmenter
                    .feed(&transcript, activity.is_speech, activity.silence_ms)
            {
                self.finish_turn(end);
            }
        }

        self.teardown();
    }

    /// Opens a turn: identity first, then the recognizer stream.
    async fn begin_turn(&mut self) {
        if let Some(previous) = self.correlator.current() {
            // The user spoke again before the previous turn's response
            // resolved; that response is now stale
            self.events.send(SessionEvent::TurnSuperseded {
                turn_id: previous.0,
            });
        }

        let turn_id = self.correlator.begin_turn();

        match self
            .recognizer
            .open_stream(turn_id, &self.stream_options)
            .await
        {
            Ok(stream) => {
                self.segmenter.begin_turn();
                self.stream = Some(stream);
                self.active_turn = Some(Turn::new(turn_id, Instant::now()));
                self.events
                    .send(SessionEvent::TurnStarted { turn_id: turn_id.0 });
            }
            Err(e) => {
                self.correlator.supersede(turn_id);
                self.events.send(SessionEvent::Status {
                    message: format!("could not start transcription: {e}"),
                });
                self.backoff_until = Some(Instant::now() + self.error_backoff);
            }
        }
    }

    /// Applies pending transcript events to the current turn, dropping any
    /// tagged with a stale turn id.
    fn drain_transcripts(&mut self) {
        let mut pending = Vec::new();
        if let Some(stream) = self.stream.as_mut() {
            while let Some(event) = stream.try_next_event() {
                pending.push(event);
            }
        }

        for event in pending {
            let Some(turn) = self.active_turn.as_mut() else {
                break;
            };
            if event.turn_id != turn.id {
                continue;
            }
            turn.observe_transcript(&event.text, event.is_final);
            if !event.is_final {
                self.events.send(SessionEvent::Partial {
                    turn_id: event.turn_id.0,
                    text: event.text,
                });
            }
        }
    }

    /// Abandons the current turn after a stream/recognition error. The
    /// transcript so far is discarded; stale audio is never resent.
    fn abandon_turn(&mut self, message: &str) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        if let Some(mut turn) = self.active_turn.take() {
            turn.state = TurnState::Superseded;
            self.correlator.supersede(turn.id);
            self.events.send(SessionEvent::Status {
                message: format!(
                    "turn abandoned after {:.1}s: {message}",
                    turn.started_at.elapsed().as_secs_f32()
                ),
            });
        }
        self.segmenter.reset();
        self.vad.reset();
        self.backoff_until = Some(Instant::now() + self.error_backoff);
        self.events.send(SessionEvent::State {
            state: SessionState::Listening,
        });
    }

    /// Hands a finalized turn to the dialogue backend. The response is
    /// consumed by a separate task so listening continues during the wait.
    fn finish_turn(&mut self, end: EndOfTurn) {
        if let Some(mut stream) = self.stream.take() {
            // Closing flushes the backend; one final stale event may still
            // arrive and will be dropped by the correlator check
            stream.close();
        }
        let Some(mut turn) = self.active_turn.take() else {
            return;
        };
        turn.state = TurnState::Finalizing;
        let turn_id = turn.id;
        self.segmenter.reset();
        self.vad.reset();

        if end.transcript.is_empty() {
            // VAD opened a turn on noise; nothing to hand off
            self.correlator.complete(turn_id);
            self.events.send(SessionEvent::Status {
                message: format!("no speech recognized ({} frames)", turn.frame_count),
            });
            return;
        }

        turn.state = TurnState::AwaitingResponse;
        self.events.send(SessionEvent::TurnFinalized {
            turn_id: turn_id.0,
            text: end.transcript.clone(),
        });
        self.events.send(SessionEvent::State {
            state: SessionState::StreamingResponse,
        });

        let history = self
            .conversation
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default();

        let request = DialogueRequest {
            turn_id,
            turn_text: end.transcript,
            history,
        };

        let ctx = ResponseContext {
            responder: Arc::clone(&self.responder),
            synthesizer: self.synthesizer.clone(),
            scheduler: Arc::clone(&self.scheduler),
            correlator: Arc::clone(&self.correlator),
            conversation: Arc::clone(&self.conversation),
            events: self.events.clone(),
            running: Arc::clone(&self.running),
            speaking: Arc::clone(&self.speaking),
            voice: self.voice.clone(),
            resume_delay_ms: self.resume_delay_ms,
        };
        tokio::spawn(respond_and_speak(ctx, request));
    }

    /// Releases everything on exit, including error paths: open stream,
    /// in-flight turn, pending playback.
    fn teardown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        if let Some(mut turn) = self.active_turn.take() {
            turn.state = TurnState::Superseded;
            self.correlator.supersede(turn.id);
        } else if let Some(current) = self.correlator.current() {
            self.correlator.supersede(current);
        }
        if let Ok(mut scheduler) = self.scheduler.lock() {
            if let Err(e) = scheduler.clear() {
                eprintln!("voxloop: failed to stop playback: {e}");
            }
        }
        self.events.send(SessionEvent::State {
            state: SessionState::Idle,
        });
    }
}

/// Everything one response task needs.
struct ResponseContext {
    responder: Arc<dyn DialogueResponder>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    correlator: Arc<TurnCorrelator>,
    conversation: Arc<Mutex<Vec<Exchange>>>,
    events: EventSender,
    running: Arc<AtomicBool>,
    speaking: Arc<AtomicBool>,
    voice: VoiceConfig,
    resume_delay_ms: (u32, u32),
}

/// Consumes one turn's reply stream: assembles text, schedules audio, waits
/// for playback to drain, then applies the exchange to the conversation log —
/// every step guarded by the correlator so a superseded turn changes nothing.
async fn respond_and_speak(ctx: ResponseContext, request: DialogueRequest) {
    let turn_id = request.turn_id;
    let turn_text = request.turn_text.clone();

    let mut reply = match ctx.responder.respond(request).await {
        Ok(stream) => stream,
        Err(e) => {
            ctx.events.send(SessionEvent::Status {
                message: format!("dialogue request failed: {e}"),
            });
            ctx.correlator.complete(turn_id);
            ctx.events.send(SessionEvent::State {
                state: SessionState::Listening,
            });
            return;
        }
    };

    let mut reply_text = String::new();
    let mut spoke = false;

    while let Some(chunk) = reply.next_chunk().await {
        if !ctx.correlator.accepts(turn_id) {
            // Superseded mid-response: discard the rest without applying it
            if spoke {
                ctx.speaking.store(false, Ordering::SeqCst);
            }
            return;
        }

        if !chunk.text.is_empty() {
            if !reply_text.is_empty() {
                reply_text.push(' ');
            }
            reply_text.push_str(&chunk.text);
        }

        // Out-of-band audio wins; otherwise synthesize the chunk text
        let audio = match chunk.audio {
            Some(audio) => Some(audio),
            None => match (&ctx.synthesizer, chunk.text.is_empty()) {
                (Some(synthesizer), false) => {
                    match synthesizer.synthesize(&chunk.text, &ctx.voice).await {
                        Ok(audio) => Some(audio),
                        Err(e) => {
                            ctx.events.send(SessionEvent::Status {
                                message: format!("synthesis failed: {e}"),
                            });
                            None
                        }
                    }
                }
                _ => None,
            },
        };

        if let Some(audio) = audio
            && !audio.samples.is_empty()
        {
            let enqueued = ctx
                .scheduler
                .lock()
                .map_err(|e| format!("scheduler lock poisoned: {e}"))
                .and_then(|mut s| s.enqueue(&audio).map_err(|e| e.to_string()));
            match enqueued {
                Ok(_) => {
                    if !spoke {
                        spoke = true;
                        ctx.speaking.store(true, Ordering::SeqCst);
                        ctx.events.send(SessionEvent::State {
                            state: SessionState::Speaking,
                        });
                    }
                }
                Err(message) => {
                    ctx.events.send(SessionEvent::Status {
                        message: format!("playback failed: {message}"),
                    });
                }
            }
        }

        if chunk.is_final {
            break;
        }
    }

    if ctx.correlator.accepts(turn_id) {
        ctx.events.send(SessionEvent::Reply {
            turn_id: turn_id.0,
            text: reply_text.clone(),
        });
    }

    // Wait until the last scheduled chunk has played out
    if spoke {
        loop {
            let remaining = ctx
                .scheduler
                .lock()
                .ok()
                .and_then(|scheduler| scheduler.remaining());
            match remaining {
                Some(wait) => tokio::time::sleep(wait).await,
                None => break,
            }
        }
    }

    if ctx.correlator.accepts(turn_id) {
        if let Ok(mut log) = ctx.conversation.lock() {
            log.push(Exchange {
                user: turn_text,
                reply: reply_text,
            });
        }
        ctx.correlator.complete(turn_id);
        ctx.events.send(SessionEvent::PlaybackDone { turn_id: turn_id.0 });

        // Natural human-response gap before the mic reopens
        let (min, max) = ctx.resume_delay_ms;
        let delay = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        tokio::time::sleep(Duration::from_millis(delay as u64)).await;
    }

    if spoke {
        ctx.speaking.store(false, Ordering::SeqCst);
    }
    if ctx.running.load(Ordering::SeqCst) {
        ctx.events.send(SessionEvent::State {
            state: SessionState::Listening,
        });
    }
}
