//! Session observability counters.

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct SessionStats {
    pub chunks_ingested: AtomicUsize,
    pub chunks_dropped: AtomicUsize,
    pub sequence_gaps: AtomicUsize,
    pub utterances_flushed: AtomicUsize,
    pub transcripts_ok: AtomicUsize,
    pub transcripts_empty: AtomicUsize,
    pub transcripts_failed: AtomicUsize,
    pub transcripts_timed_out: AtomicUsize,
    pub entries_appended: AtomicUsize,
    pub late_entries_rejected: AtomicUsize,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            chunks_ingested: AtomicUsize::new(0),
            chunks_dropped: AtomicUsize::new(0),
            sequence_gaps: AtomicUsize::new(0),
            utterances_flushed: AtomicUsize::new(0),
            transcripts_ok: AtomicUsize::new(0),
            transcripts_empty: AtomicUsize::new(0),
            transcripts_failed: AtomicUsize::new(0),
            transcripts_timed_out: AtomicUsize::new(0),
            entries_appended: AtomicUsize::new(0),
            late_entries_rejected: AtomicUsize::new(0),
        }
    }
}

impl SessionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            chunks_ingested: self.chunks_ingested.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
            sequence_gaps: self.sequence_gaps.load(Ordering::Relaxed),
            utterances_flushed: self.utterances_flushed.load(Ordering::Relaxed),
            transcripts_ok: self.transcripts_ok.load(Ordering::Relaxed),
            transcripts_empty: self.transcripts_empty.load(Ordering::Relaxed),
            transcripts_failed: self.transcripts_failed.load(Ordering::Relaxed),
            transcripts_timed_out: self.transcripts_timed_out.load(Ordering::Relaxed),
            entries_appended: self.entries_appended.load(Ordering::Relaxed),
            late_entries_rejected: self.late_entries_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub chunks_ingested: usize,
    pub chunks_dropped: usize,
    pub sequence_gaps: usize,
    pub utterances_flushed: usize,
    pub transcripts_ok: usize,
    pub transcripts_empty: usize,
    pub transcripts_failed: usize,
    pub transcripts_timed_out: usize,
    pub entries_appended: usize,
    pub late_entries_rejected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counter_updates() {
        let stats = SessionStats::default();
        stats.chunks_ingested.fetch_add(3, Ordering::Relaxed);
        stats.transcripts_failed.fetch_add(1, Ordering::Relaxed);

        let snap = stats.snapshot();
        assert_eq!(snap.chunks_ingested, 3);
        assert_eq!(snap.transcripts_failed, 1);
        assert_eq!(snap.chunks_dropped, 0);
    }
}
