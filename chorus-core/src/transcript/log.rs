//! Append-only, thread-safe transcript store.
//!
//! Written by transcription completions (one writer per speaker lane, racing
//! freely), read by drain calls and snapshots. Sequence numbers are assigned
//! under the write lock, so they are strictly increasing and never reused no
//! matter how many writers race. Reads clone a snapshot and never block
//! writers for longer than the copy.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::warn;

use crate::transcript::entry::{EntryDraft, TranscriptEntry};

/// Append-only ordered store of finalized transcript entries.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    entries: RwLock<Vec<TranscriptEntry>>,
    frozen: AtomicBool,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next sequence number and append.
    ///
    /// Returns the stored entry, or `None` when the log has been frozen — a
    /// transcription finishing after the session's final read must not mutate
    /// the frozen transcript.
    pub fn append(&self, draft: EntryDraft) -> Option<TranscriptEntry> {
        let mut entries = self.entries.write();
        if self.frozen.load(Ordering::Acquire) {
            warn!(speaker = %draft.speaker, "transcript log frozen — entry rejected");
            return None;
        }
        let seq = entries.len() as u64 + 1;
        let entry = draft.with_seq(seq);
        entries.push(entry.clone());
        Some(entry)
    }

    /// All entries with sequence number greater than `cursor`, plus the new
    /// cursor value.
    ///
    /// Non-blocking: returns an empty batch (and the cursor unchanged) when
    /// nothing new is available.
    pub fn drain_since(&self, cursor: u64) -> (Vec<TranscriptEntry>, u64) {
        let entries = self.entries.read();
        let start = cursor.min(entries.len() as u64) as usize;
        let batch: Vec<TranscriptEntry> = entries[start..].to_vec();
        let new_cursor = batch.last().map_or(cursor, |entry| entry.seq);
        (batch, new_cursor)
    }

    /// Immutable snapshot of all entries in append order.
    pub fn full_log(&self) -> Vec<TranscriptEntry> {
        self.entries.read().clone()
    }

    /// Reject all further appends. Entries already stored are unaffected.
    pub fn freeze(&self) {
        let _entries = self.entries.write();
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::chunk::SpeakerId;
    use crate::transcript::entry::EntryKind;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn draft(speaker: u64, text: &str) -> EntryDraft {
        EntryDraft {
            speaker: SpeakerId(speaker),
            label: format!("speaker-{speaker}"),
            text: text.into(),
            kind: EntryKind::Text,
            start_ms: 0,
            end_ms: 100,
        }
    }

    #[test]
    fn append_assigns_increasing_sequence_numbers() {
        let log = TranscriptLog::new();
        let a = log.append(draft(1, "a")).expect("append");
        let b = log.append(draft(2, "b")).expect("append");
        assert_eq!(a.seq, 1);
        assert_eq!(b.seq, 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn concurrent_appenders_never_reuse_a_sequence_number() {
        let log = Arc::new(TranscriptLog::new());
        let mut handles = Vec::new();
        for speaker in 0..8u64 {
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    log.append(draft(speaker, &format!("{speaker}-{i}")))
                        .expect("append");
                }
            }));
        }
        for handle in handles {
            handle.join().expect("appender thread panicked");
        }

        let entries = log.full_log();
        assert_eq!(entries.len(), 400);
        let seqs: HashSet<u64> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs.len(), 400, "sequence numbers must be unique");
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.seq, i as u64 + 1, "append order must match seq");
        }
    }

    #[test]
    fn drain_since_is_empty_without_new_appends() {
        let log = TranscriptLog::new();
        let (batch, cursor) = log.drain_since(0);
        assert!(batch.is_empty());
        assert_eq!(cursor, 0);
        let (batch, cursor) = log.drain_since(cursor);
        assert!(batch.is_empty());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn drain_since_returns_exactly_the_new_entries() {
        let log = TranscriptLog::new();
        for i in 0..3 {
            log.append(draft(1, &format!("line {i}"))).expect("append");
        }

        let (batch, cursor) = log.drain_since(0);
        assert_eq!(batch.len(), 3);
        assert_eq!(cursor, 3);

        log.append(draft(2, "late")).expect("append");
        let (batch, cursor) = log.drain_since(cursor);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].text, "late");
        assert_eq!(cursor, 4);

        let (batch, cursor) = log.drain_since(cursor);
        assert!(batch.is_empty());
        assert_eq!(cursor, 4);
    }

    #[test]
    fn frozen_log_rejects_appends_but_keeps_entries() {
        let log = TranscriptLog::new();
        log.append(draft(1, "kept")).expect("append");
        log.freeze();
        assert!(log.append(draft(1, "dropped")).is_none());
        assert_eq!(log.len(), 1);
        assert_eq!(log.full_log()[0].text, "kept");
        assert!(log.is_frozen());
    }
}
