//! Transcript entry and event types.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` with camelCase
//! field names so the command/UI layer can forward them unchanged.

use serde::{Deserialize, Serialize};

use crate::buffering::chunk::SpeakerId;

/// Distinguishes recognised text from failure placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Recognised text from the engine.
    Text,
    /// The engine failed for this utterance; text is empty. The time slot is
    /// kept so the gap is visible in the transcript.
    Failure,
    /// The engine did not answer within the per-utterance deadline.
    Timeout,
}

/// A finalized line of the session transcript.
///
/// Immutable once appended. `seq` reflects append order, assigned by the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Monotonically increasing append sequence number (starts at 1).
    pub seq: u64,
    pub speaker: SpeakerId,
    /// Display label resolved at append time.
    pub label: String,
    pub text: String,
    pub kind: EntryKind,
    /// Utterance start, milliseconds since the session epoch.
    pub start_ms: u64,
    /// Utterance end, milliseconds since the session epoch.
    pub end_ms: u64,
}

/// An entry awaiting its append-time sequence number.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub speaker: SpeakerId,
    pub label: String,
    pub text: String,
    pub kind: EntryKind,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl EntryDraft {
    pub(crate) fn with_seq(self, seq: u64) -> TranscriptEntry {
        TranscriptEntry {
            seq,
            speaker: self.speaker,
            label: self.label,
            text: self.text,
            kind: self.kind,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
        }
    }
}

/// Broadcast to live subscribers whenever an entry is appended to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub entry: TranscriptEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_with_camel_case_and_lowercase_kind() {
        let entry = TranscriptEntry {
            seq: 3,
            speaker: SpeakerId(12),
            label: "Alice".into(),
            text: "hello there".into(),
            kind: EntryKind::Text,
            start_ms: 1500,
            end_ms: 3500,
        };

        let json = serde_json::to_value(&entry).expect("serialize entry");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["speaker"], 12);
        assert_eq!(json["label"], "Alice");
        assert_eq!(json["kind"], "text");
        assert_eq!(json["startMs"], 1500);
        assert_eq!(json["endMs"], 3500);

        let round_trip: TranscriptEntry = serde_json::from_value(json).expect("deserialize entry");
        assert_eq!(round_trip.seq, 3);
        assert_eq!(round_trip.kind, EntryKind::Text);
        assert_eq!(round_trip.speaker, SpeakerId(12));
    }

    #[test]
    fn entry_kind_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<EntryKind>(r#""Failure""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }

    #[test]
    fn event_wraps_the_entry() {
        let event = TranscriptEvent {
            entry: TranscriptEntry {
                seq: 1,
                speaker: SpeakerId(5),
                label: "Bob".into(),
                text: String::new(),
                kind: EntryKind::Timeout,
                start_ms: 0,
                end_ms: 900,
            },
        };
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["entry"]["kind"], "timeout");
    }
}
