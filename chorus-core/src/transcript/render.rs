//! Chronological text rendering of a transcript.
//!
//! The log stores entries in append (completion) order; for display they are
//! sorted by utterance start time.

use crate::transcript::entry::{EntryKind, TranscriptEntry};

/// Render entries as a markdown transcript, chronologically ordered.
///
/// Lines follow the `[MM:SS] label: text` convention, switching to
/// `[HH:MM:SS]` past the first hour. Failure placeholders keep their time
/// slot with a visible marker instead of text.
pub fn render_transcript(session_id: &str, entries: &[TranscriptEntry]) -> String {
    let mut ordered: Vec<&TranscriptEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| (entry.start_ms, entry.seq));

    let mut lines = Vec::with_capacity(ordered.len() + 2);
    lines.push(format!("# Transcript – {session_id}"));
    lines.push(String::new());
    for entry in ordered {
        let timestamp = format_timestamp(entry.start_ms / 1000);
        let text = match entry.kind {
            EntryKind::Text => entry.text.as_str(),
            EntryKind::Failure => "[transcription failed]",
            EntryKind::Timeout => "[transcription timed out]",
        };
        lines.push(format!("[{timestamp}] {}: {text}", entry.label));
    }
    lines.join("\n") + "\n"
}

fn format_timestamp(total_seconds: u64) -> String {
    let (minutes, seconds) = (total_seconds / 60, total_seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
