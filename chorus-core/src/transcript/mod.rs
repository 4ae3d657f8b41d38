//! The session transcript: entry types, the append-only log, and
//! chronological rendering.
//!
//! Append order (used for drain cursors) is completion order, NOT
//! chronological order — transcription for an earlier utterance may finish
//! after a later one from another speaker. Consumers that need chronological
//! display sort by start time; [`render`] does exactly that.

pub mod entry;
pub mod log;
pub mod render;

pub use entry::{EntryDraft, EntryKind, TranscriptEntry, TranscriptEvent};
pub use log::TranscriptLog;
pub use render::render_transcript;
