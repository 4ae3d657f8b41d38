//! # chorus-core
//!
//! Concurrent multi-speaker transcript assembly engine.
//!
//! ## Architecture
//!
//! ```text
//! capture layer ─► Session::ingest ─► Dispatcher ─► PerSpeakerBuffer (×N)
//!                                          │              │ flush
//!                                          │              ▼
//!                                          │      lane worker (FIFO per speaker)
//!                                          │              │ spawn_blocking
//!                                          │              ▼
//!                                          │      Transcriber::transcribe
//!                                          │              │
//!                                          ▼              ▼
//!                                    TranscriptLog ◄── append (completion order)
//!                                          │
//!                        drain / full_log / broadcast::Sender<TranscriptEvent>
//! ```
//!
//! Unrelated speakers never share a lock: the speaker map is locked only for
//! the lookup-or-insert instant, and each speaker's buffer has its own lock
//! that is released before any engine call.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod buffering;
pub mod clock;
pub mod error;
pub mod session;
pub mod speakers;
pub mod stats;
pub mod transcribe;
pub mod transcript;

// Convenience re-exports for downstream crates
pub use buffering::chunk::{AudioChunk, SpeakerId, Utterance};
pub use buffering::speaker::{FlushConfig, PerSpeakerBuffer};
pub use clock::{Clock, SystemClock};
pub use error::ChorusError;
pub use session::{
    DropReason, IngestOutcome, Session, SessionConfig, SessionId, SessionState, StopOutcome,
};
pub use speakers::SpeakerDirectory;
pub use stats::{SessionStats, StatsSnapshot};
pub use transcribe::{LanguageHint, StubTranscriber, Transcriber, TranscriberHandle};
pub use transcript::{EntryDraft, EntryKind, TranscriptEntry, TranscriptEvent, TranscriptLog};
