//! Routes audio chunks to per-speaker buffers and runs transcription lanes.
//!
//! ## Concurrency layout
//!
//! ```text
//! submit_chunk ──► lanes map (map lock, lookup/insert only)
//!                     │
//!                per-speaker lane
//!                     │  buffer lock: append + maybe_flush + enqueue
//!                     ▼
//!            mpsc queue (FIFO per speaker)
//!                     │
//!               lane worker task ──► spawn_blocking(engine.transcribe)
//!                     │                       (with deadline)
//!                     ▼
//!            TranscriptLog.append ──► broadcast TranscriptEvent
//! ```
//!
//! The map lock is held only for the lookup-or-insert instant; all buffer
//! mutation happens under that speaker's own lock, so unrelated speakers
//! never serialise. Flushed utterances are enqueued while the buffer lock is
//! still held, which makes intra-speaker submission order equal flush order.
//! No lock is ever held across an engine call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DropReason, IngestOutcome};
use crate::buffering::chunk::{AudioChunk, SpeakerId, Utterance};
use crate::buffering::speaker::{FlushConfig, PerSpeakerBuffer};
use crate::clock::Clock;
use crate::speakers::SpeakerDirectory;
use crate::stats::SessionStats;
use crate::transcribe::{LanguageHint, TranscriberHandle};
use crate::transcript::{EntryDraft, EntryKind, TranscriptEvent, TranscriptLog};

/// Everything a dispatcher shares with the session, passed as one struct.
pub(crate) struct DispatcherContext {
    pub flush: FlushConfig,
    pub flush_tick: Duration,
    pub utterance_timeout: Duration,
    pub max_speakers: usize,
    pub engine: TranscriberHandle,
    pub language: Arc<RwLock<LanguageHint>>,
    pub directory: Arc<SpeakerDirectory>,
    pub log: Arc<TranscriptLog>,
    pub stats: Arc<SessionStats>,
    pub events: broadcast::Sender<TranscriptEvent>,
    pub clock: Arc<dyn Clock>,
    pub runtime: Handle,
}

/// One speaker's routing state: the buffer behind its per-speaker lock, the
/// FIFO queue into its worker, and the worker handle for shutdown.
struct Lane {
    buffer: Mutex<PerSpeakerBuffer>,
    /// Taken (dropped) to close the queue; the worker exits after draining.
    tx: Mutex<Option<mpsc::UnboundedSender<Utterance>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
    fn enqueue(&self, utterance: Utterance) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(utterance).is_ok(),
            None => false,
        }
    }

    fn close(&self) {
        self.tx.lock().take();
    }
}

pub(crate) struct Dispatcher {
    lanes: Mutex<HashMap<SpeakerId, Arc<Lane>>>,
    /// Workers of lanes closed mid-session (speaker leave); awaited at stop.
    retired: Mutex<Vec<(SpeakerId, JoinHandle<()>)>>,
    accepting: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
    flush: FlushConfig,
    utterance_timeout: Duration,
    max_speakers: usize,
    engine: TranscriberHandle,
    language: Arc<RwLock<LanguageHint>>,
    directory: Arc<SpeakerDirectory>,
    log: Arc<TranscriptLog>,
    stats: Arc<SessionStats>,
    events: broadcast::Sender<TranscriptEvent>,
    runtime: Handle,
}

impl Dispatcher {
    /// Create the dispatcher and spawn its flush ticker.
    pub(crate) fn new(ctx: DispatcherContext) -> Arc<Self> {
        let dispatcher = Arc::new(Self {
            lanes: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
            accepting: AtomicBool::new(true),
            ticker: Mutex::new(None),
            flush: ctx.flush,
            utterance_timeout: ctx.utterance_timeout,
            max_speakers: ctx.max_speakers,
            engine: ctx.engine,
            language: ctx.language,
            directory: ctx.directory,
            log: ctx.log,
            stats: ctx.stats,
            events: ctx.events,
            runtime: ctx.runtime,
        });

        let ticker = dispatcher.runtime.spawn(run_flush_ticker(
            Arc::downgrade(&dispatcher),
            ctx.clock,
            ctx.flush_tick,
        ));
        *dispatcher.ticker.lock() = Some(ticker);

        dispatcher
    }

    /// Route one chunk to its speaker's buffer, flushing if a condition is met.
    pub(crate) fn submit_chunk(&self, chunk: AudioChunk) -> IngestOutcome {
        if !self.accepting.load(Ordering::Acquire) {
            self.stats.chunks_dropped.fetch_add(1, Ordering::Relaxed);
            return IngestOutcome::Dropped(DropReason::SessionStopped);
        }

        let speaker = chunk.speaker;
        let lane = {
            let mut lanes = self.lanes.lock();
            match lanes.get(&speaker) {
                Some(lane) => Arc::clone(lane),
                None => {
                    if lanes.len() >= self.max_speakers {
                        self.stats.chunks_dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            %speaker,
                            cap = self.max_speakers,
                            "speaker cap reached — dropping chunk"
                        );
                        return IngestOutcome::Dropped(DropReason::SpeakerLimit);
                    }
                    let lane = self.create_lane(speaker);
                    lanes.insert(speaker, Arc::clone(&lane));
                    lane
                }
            }
        };

        let timestamp = chunk.timestamp;
        {
            let mut buffer = lane.buffer.lock();
            if let Err(err) = buffer.append(chunk) {
                self.stats.sequence_gaps.fetch_add(1, Ordering::Relaxed);
                warn!(%speaker, %err, "audio retained despite sequence gap");
            }
            while let Some(utterance) = buffer.maybe_flush(timestamp) {
                self.dispatch_utterance(&lane, utterance);
            }
        }

        self.stats.chunks_ingested.fetch_add(1, Ordering::Relaxed);
        IngestOutcome::Accepted
    }

    /// Force-flush and close one speaker's lane (speaker leave).
    ///
    /// The worker keeps running until its queue is drained; its handle is
    /// retired and awaited at session stop. Returns false for an unknown
    /// speaker.
    pub(crate) fn stop_speaker(&self, speaker: SpeakerId) -> bool {
        let Some(lane) = self.lanes.lock().remove(&speaker) else {
            return false;
        };

        {
            let mut buffer = lane.buffer.lock();
            if let Some(utterance) = buffer.force_flush() {
                self.dispatch_utterance(&lane, utterance);
            }
        }
        lane.close();
        if let Some(worker) = lane.worker.lock().take() {
            self.retired.lock().push((speaker, worker));
        }
        info!(%speaker, "speaker lane closed");
        true
    }

    /// Stop accepting audio, force-flush every lane, and wait for all
    /// transcription workers under a shared deadline.
    ///
    /// Returns the speakers whose workers did not finish in time; their
    /// in-flight calls finish in place on detached tasks.
    pub(crate) async fn stop(&self, timeout: Duration) -> Vec<SpeakerId> {
        self.accepting.store(false, Ordering::Release);
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
        }

        let lanes: Vec<(SpeakerId, Arc<Lane>)> = self.lanes.lock().drain().collect();
        let mut pending: Vec<(SpeakerId, JoinHandle<()>)> = Vec::new();
        for (speaker, lane) in lanes {
            {
                let mut buffer = lane.buffer.lock();
                if let Some(utterance) = buffer.force_flush() {
                    self.dispatch_utterance(&lane, utterance);
                }
            }
            lane.close();
            if let Some(worker) = lane.worker.lock().take() {
                pending.push((speaker, worker));
            }
        }
        pending.extend(self.retired.lock().drain(..));

        let deadline = tokio::time::Instant::now() + timeout;
        let mut missing = Vec::new();
        for (speaker, worker) in pending {
            match tokio::time::timeout_at(deadline, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    error!(%speaker, %join_err, "lane worker panicked")
                }
                Err(_) => {
                    warn!(%speaker, "lane did not finish before the stop deadline");
                    missing.push(speaker);
                }
            }
        }
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Silence-flush sweep across all lanes, driven by the ticker.
    fn sweep(&self, now: Duration) {
        let lanes: Vec<Arc<Lane>> = self.lanes.lock().values().cloned().collect();
        for lane in lanes {
            let mut buffer = lane.buffer.lock();
            while let Some(utterance) = buffer.maybe_flush(now) {
                self.dispatch_utterance(&lane, utterance);
            }
        }
    }

    fn dispatch_utterance(&self, lane: &Lane, utterance: Utterance) {
        let speaker = utterance.speaker;
        self.stats.utterances_flushed.fetch_add(1, Ordering::Relaxed);
        debug!(
            %speaker,
            samples = utterance.samples.len(),
            "utterance flushed for transcription"
        );
        if !lane.enqueue(utterance) {
            warn!(%speaker, "lane queue closed — utterance discarded");
        }
    }

    fn create_lane(&self, speaker: SpeakerId) -> Arc<Lane> {
        let (tx, rx) = mpsc::unbounded_channel();
        let lane = Arc::new(Lane {
            buffer: Mutex::new(PerSpeakerBuffer::new(speaker, self.flush)),
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(None),
        });

        let worker = self.runtime.spawn(run_lane_worker(LaneContext {
            speaker,
            rx,
            engine: self.engine.clone(),
            language: Arc::clone(&self.language),
            directory: Arc::clone(&self.directory),
            log: Arc::clone(&self.log),
            stats: Arc::clone(&self.stats),
            events: self.events.clone(),
            utterance_timeout: self.utterance_timeout,
        }));
        *lane.worker.lock() = Some(worker);

        info!(%speaker, "speaker lane created");
        lane
    }
}

/// Periodically sweeps lanes so a speaker who goes silent is flushed without
/// needing another chunk. Exits when the dispatcher is dropped or stopped.
async fn run_flush_ticker(dispatcher: Weak<Dispatcher>, clock: Arc<dyn Clock>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let Some(dispatcher) = dispatcher.upgrade() else {
            break;
        };
        if !dispatcher.accepting.load(Ordering::Acquire) {
            break;
        }
        dispatcher.sweep(clock.now());
    }
}

/// All state one lane worker needs.
struct LaneContext {
    speaker: SpeakerId,
    rx: mpsc::UnboundedReceiver<Utterance>,
    engine: TranscriberHandle,
    language: Arc<RwLock<LanguageHint>>,
    directory: Arc<SpeakerDirectory>,
    log: Arc<TranscriptLog>,
    stats: Arc<SessionStats>,
    events: broadcast::Sender<TranscriptEvent>,
    utterance_timeout: Duration,
}

/// Processes one speaker's utterances in FIFO order until the queue closes.
async fn run_lane_worker(mut ctx: LaneContext) {
    while let Some(utterance) = ctx.rx.recv().await {
        transcribe_one(&ctx, utterance).await;
    }
    debug!(speaker = %ctx.speaker, "lane worker drained");
}

async fn transcribe_one(ctx: &LaneContext, utterance: Utterance) {
    let speaker = ctx.speaker;
    let start_ms = utterance.start.as_millis() as u64;
    let end_ms = utterance.end.as_millis() as u64;

    // Snapshot the hint so a live language change applies atomically per call.
    let language = ctx.language.read().clone();
    let engine = ctx.engine.clone();
    let call =
        tokio::task::spawn_blocking(move || engine.transcribe(&utterance, &language));

    let (text, kind) = match tokio::time::timeout(ctx.utterance_timeout, call).await {
        Ok(Ok(Ok(text))) if text.trim().is_empty() => {
            ctx.stats.transcripts_empty.fetch_add(1, Ordering::Relaxed);
            debug!(%speaker, "engine returned empty text — no entry");
            return;
        }
        Ok(Ok(Ok(text))) => {
            ctx.stats.transcripts_ok.fetch_add(1, Ordering::Relaxed);
            (text, EntryKind::Text)
        }
        Ok(Ok(Err(err))) => {
            ctx.stats.transcripts_failed.fetch_add(1, Ordering::Relaxed);
            error!(%speaker, %err, "transcription failed — recording placeholder");
            (String::new(), EntryKind::Failure)
        }
        Ok(Err(join_err)) => {
            ctx.stats.transcripts_failed.fetch_add(1, Ordering::Relaxed);
            error!(%speaker, %join_err, "transcription call panicked — recording placeholder");
            (String::new(), EntryKind::Failure)
        }
        Err(_elapsed) => {
            ctx.stats
                .transcripts_timed_out
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                %speaker,
                timeout = ?ctx.utterance_timeout,
                "transcription deadline exceeded — recording placeholder; the call finishes in place"
            );
            (String::new(), EntryKind::Timeout)
        }
    };

    let draft = EntryDraft {
        speaker,
        label: ctx.directory.resolve(speaker),
        text,
        kind,
        start_ms,
        end_ms,
    };
    match ctx.log.append(draft) {
        Some(entry) => {
            ctx.stats.entries_appended.fetch_add(1, Ordering::Relaxed);
            let _ = ctx.events.send(TranscriptEvent { entry });
        }
        None => {
            ctx.stats
                .late_entries_rejected
                .fetch_add(1, Ordering::Relaxed);
        }
    }
}
