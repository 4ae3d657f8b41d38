//! Session lifecycle: `Idle → Recording → Stopping → Stopped`.
//!
//! ```text
//! Session::new()
//!     └─► start()        → engine warmed up, log + dispatcher created
//!         └─► ingest()   → chunks routed while Recording; dropped otherwise
//!         └─► drain()    → non-blocking read of whatever is ready
//!         └─► stop()     → flush all speakers, await in-flight work,
//!                          freeze the log, return the final transcript
//! ```
//!
//! A session records once: after `Stopped`, both `ingest` and `start` are
//! rejected — a new `Session` is created for a new recording.

mod dispatcher;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::buffering::chunk::{AudioChunk, SpeakerId};
use crate::buffering::speaker::FlushConfig;
use crate::clock::SystemClock;
use crate::error::{ChorusError, Result};
use crate::speakers::SpeakerDirectory;
use crate::stats::{SessionStats, StatsSnapshot};
use crate::transcribe::{LanguageHint, TranscriberHandle};
use crate::transcript::{render_transcript, TranscriptEntry, TranscriptEvent, TranscriptLog};

use dispatcher::{Dispatcher, DispatcherContext};

/// Broadcast channel capacity: 256 transcript events buffered for slow
/// consumers.
const BROADCAST_CAP: usize = 256;

/// Wall-clock identifier for one recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate an id from the current local time, e.g. `2026-08-08_20-15-03`.
    pub fn generate() -> Self {
        Self(chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created but `start()` not yet called.
    Idle,
    /// Accepting audio and transcribing.
    Recording,
    /// `stop()` in progress: flushing buffers, awaiting in-flight work.
    Stopping,
    /// Terminal. The transcript is frozen for final reads.
    Stopped,
}

/// Why a chunk was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The session has not been started yet.
    NotStarted,
    /// The session is stopping or stopped.
    SessionStopped,
    /// The speaker cap was reached and this speaker has no lane.
    SpeakerLimit,
}

/// Outcome of offering a chunk to the session.
///
/// Dropping is not an error: audio arriving outside `Recording` is counted
/// and discarded so a finished session can never be resurrected by a late
/// packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    Dropped(DropReason),
}

/// Result of stopping a session.
#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// All speakers' in-flight work finished in time.
    Complete(Vec<TranscriptEntry>),
    /// Some speakers' transcriptions outlived the stop deadline; the
    /// transcript is final except for their missing tail entries.
    PartialTimeout {
        entries: Vec<TranscriptEntry>,
        missing_speakers: Vec<SpeakerId>,
    },
}

impl StopOutcome {
    pub fn entries(&self) -> &[TranscriptEntry] {
        match self {
            Self::Complete(entries) => entries,
            Self::PartialTimeout { entries, .. } => entries,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Tunable parameters for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Per-speaker flush thresholds.
    pub flush: FlushConfig,
    /// How often silent speakers are swept for a silence flush.
    /// Default: 100 ms.
    pub flush_tick: Duration,
    /// Deadline for a single transcription call. Default: 30 s.
    pub utterance_timeout: Duration,
    /// Deadline for `stop()` to wait on in-flight work. Default: 10 s.
    pub stop_timeout: Duration,
    /// Maximum number of concurrently tracked speakers. Default: 10.
    pub max_speakers: usize,
    /// Initial language hint; changeable while recording.
    pub language: LanguageHint,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush: FlushConfig::default(),
            flush_tick: Duration::from_millis(100),
            utterance_timeout: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(10),
            max_speakers: 10,
            language: LanguageHint::auto(),
        }
    }
}

/// One recording session.
///
/// `Session` is `Send + Sync` — all fields use interior mutability. Wrap in
/// `Arc<Session>` to share between the audio producer, transcript readers,
/// and the command layer.
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    engine: TranscriberHandle,
    directory: Arc<SpeakerDirectory>,
    language: Arc<RwLock<LanguageHint>>,
    state: Mutex<SessionState>,
    dispatcher: Mutex<Option<Arc<Dispatcher>>>,
    log: Mutex<Option<Arc<TranscriptLog>>>,
    stats: Arc<SessionStats>,
    events: broadcast::Sender<TranscriptEvent>,
}

impl Session {
    /// Create a new idle session. Call `start()` to begin accepting audio.
    pub fn new(
        config: SessionConfig,
        engine: TranscriberHandle,
        directory: Arc<SpeakerDirectory>,
    ) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAP);
        let language = Arc::new(RwLock::new(config.language.clone()));
        Self {
            id: SessionId::generate(),
            config,
            engine,
            directory,
            language,
            state: Mutex::new(SessionState::Idle),
            dispatcher: Mutex::new(None),
            log: Mutex::new(None),
            stats: Arc::new(SessionStats::default()),
            events,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Subscribe to live transcript events.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.events.subscribe()
    }

    /// Begin recording: warm up the engine, create the transcript log and
    /// the dispatcher.
    ///
    /// Must be called from within a Tokio runtime — the dispatcher spawns
    /// its ticker and lane workers on the current runtime, which keeps
    /// `ingest` safe to call from any thread afterwards.
    ///
    /// # Errors
    /// - `ChorusError::AlreadyRecording` if the session is not `Idle`
    ///   (including after `stop()` — sessions record once).
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != SessionState::Idle {
            return Err(ChorusError::AlreadyRecording);
        }

        self.engine.warm_up()?;

        let log = Arc::new(TranscriptLog::new());
        let dispatcher = Dispatcher::new(DispatcherContext {
            flush: self.config.flush,
            flush_tick: self.config.flush_tick,
            utterance_timeout: self.config.utterance_timeout,
            max_speakers: self.config.max_speakers,
            engine: self.engine.clone(),
            language: Arc::clone(&self.language),
            directory: Arc::clone(&self.directory),
            log: Arc::clone(&log),
            stats: Arc::clone(&self.stats),
            events: self.events.clone(),
            clock: Arc::new(SystemClock::new()),
            runtime: tokio::runtime::Handle::current(),
        });

        *self.log.lock() = Some(log);
        *self.dispatcher.lock() = Some(dispatcher);
        *state = SessionState::Recording;
        info!(session = %self.id, "recording started");
        Ok(())
    }

    /// Offer one audio chunk to the session.
    ///
    /// Valid only while `Recording`; otherwise the chunk is dropped, counted,
    /// and reported via the returned outcome — never an error.
    pub fn ingest(&self, chunk: AudioChunk) -> IngestOutcome {
        let state = *self.state.lock();
        match state {
            SessionState::Recording => {}
            SessionState::Idle => {
                self.stats.chunks_dropped.fetch_add(1, Ordering::Relaxed);
                debug!(speaker = %chunk.speaker, "chunk before start — dropped");
                return IngestOutcome::Dropped(DropReason::NotStarted);
            }
            SessionState::Stopping | SessionState::Stopped => {
                self.stats.chunks_dropped.fetch_add(1, Ordering::Relaxed);
                debug!(speaker = %chunk.speaker, "chunk after stop — dropped");
                return IngestOutcome::Dropped(DropReason::SessionStopped);
            }
        }

        let dispatcher = self.dispatcher.lock().clone();
        match dispatcher {
            Some(dispatcher) => dispatcher.submit_chunk(chunk),
            // stop() raced us between the state check and here.
            None => IngestOutcome::Dropped(DropReason::SessionStopped),
        }
    }

    /// Non-blocking read of all entries appended since `cursor`.
    ///
    /// Returns the entries and the new cursor (unchanged when nothing is
    /// ready). Valid in any state; before `start()` the log is empty.
    pub fn drain(&self, cursor: u64) -> (Vec<TranscriptEntry>, u64) {
        let log = self.log.lock().clone();
        match log {
            Some(log) => log.drain_since(cursor),
            None => (Vec::new(), cursor),
        }
    }

    /// Snapshot of the full transcript in append order.
    pub fn full_transcript(&self) -> Vec<TranscriptEntry> {
        let log = self.log.lock().clone();
        log.map(|log| log.full_log()).unwrap_or_default()
    }

    /// Render the transcript as chronological markdown text.
    pub fn transcript_text(&self) -> String {
        render_transcript(self.id.as_str(), &self.full_transcript())
    }

    /// Stop recording: force-flush every speaker, wait for in-flight
    /// transcriptions (bounded by `stop_timeout`), and freeze the log.
    ///
    /// In-flight engine calls are never cancelled; a speaker whose work
    /// outlives the deadline is reported in `StopOutcome::PartialTimeout`
    /// and its late result is rejected by the frozen log.
    ///
    /// # Errors
    /// - `ChorusError::NotRecording` if the session is not `Recording`.
    pub async fn stop(&self) -> Result<StopOutcome> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Recording {
                return Err(ChorusError::NotRecording);
            }
            *state = SessionState::Stopping;
        }
        info!(session = %self.id, "stop requested — flushing speakers");

        let dispatcher = self.dispatcher.lock().take();
        let missing = match dispatcher {
            Some(dispatcher) => dispatcher.stop(self.config.stop_timeout).await,
            None => Vec::new(),
        };

        let log = self.log.lock().clone();
        let entries = match log {
            Some(log) => {
                log.freeze();
                log.full_log()
            }
            None => Vec::new(),
        };

        *self.state.lock() = SessionState::Stopped;
        info!(
            session = %self.id,
            entries = entries.len(),
            timed_out_speakers = missing.len(),
            "recording stopped"
        );

        if missing.is_empty() {
            Ok(StopOutcome::Complete(entries))
        } else {
            Ok(StopOutcome::PartialTimeout {
                entries,
                missing_speakers: missing,
            })
        }
    }

    /// Map a speaker-leave event to a forced flush of that speaker's lane.
    ///
    /// Returns false when the speaker has no lane (never spoke, or already
    /// left). The speaker's in-flight work still completes and is awaited at
    /// `stop()`.
    pub fn speaker_left(&self, speaker: SpeakerId) -> bool {
        let dispatcher = self.dispatcher.lock().clone();
        dispatcher.map_or(false, |dispatcher| dispatcher.stop_speaker(speaker))
    }

    /// Record a speaker's display label (join event). The lane itself is
    /// created lazily on first audio.
    pub fn speaker_joined(&self, speaker: SpeakerId, label: impl Into<String>) {
        self.directory.register(speaker, label);
    }

    /// Change the language hint for subsequent transcription calls.
    pub fn set_language(&self, language: LanguageHint) {
        info!(session = %self.id, %language, "transcription language changed");
        *self.language.write() = language;
    }

    /// The language hint currently in effect.
    pub fn language(&self) -> LanguageHint {
        self.language.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::StubTranscriber;

    fn session() -> Session {
        Session::new(
            SessionConfig::default(),
            TranscriberHandle::new(StubTranscriber::new()),
            Arc::new(SpeakerDirectory::new()),
        )
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let session = session();
        session.start().expect("first start");
        assert!(matches!(
            session.start(),
            Err(ChorusError::AlreadyRecording)
        ));
        session.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn stop_without_start_is_rejected() {
        let session = session();
        assert!(matches!(session.stop().await, Err(ChorusError::NotRecording)));
    }

    #[tokio::test]
    async fn stopped_session_cannot_restart() {
        let session = session();
        session.start().expect("start");
        session.stop().await.expect("stop");
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(matches!(
            session.start(),
            Err(ChorusError::AlreadyRecording)
        ));
    }

    #[tokio::test]
    async fn ingest_before_start_is_dropped_not_an_error() {
        let session = session();
        let outcome = session.ingest(AudioChunk::new(
            SpeakerId(1),
            vec![0.1; 1600],
            16_000,
            Duration::ZERO,
            0,
        ));
        assert_eq!(outcome, IngestOutcome::Dropped(DropReason::NotStarted));
        assert_eq!(session.stats().chunks_dropped, 1);
    }

    #[tokio::test]
    async fn drain_before_start_is_empty() {
        let session = session();
        let (entries, cursor) = session.drain(0);
        assert!(entries.is_empty());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn session_id_has_wall_clock_shape() {
        let id = SessionId::generate();
        // e.g. "2026-08-08_20-15-03"
        assert_eq!(id.as_str().len(), 19);
        assert_eq!(&id.as_str()[4..5], "-");
        assert_eq!(&id.as_str()[10..11], "_");
    }

    #[test]
    fn session_state_serializes_lowercase() {
        let json = serde_json::to_value(SessionState::Recording).expect("serialize state");
        assert_eq!(json, "recording");
    }
}
