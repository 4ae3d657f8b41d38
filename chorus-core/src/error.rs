use thiserror::Error;

use crate::buffering::chunk::SpeakerId;

/// All errors produced by chorus-core.
#[derive(Debug, Error)]
pub enum ChorusError {
    /// A chunk's per-speaker sequence number did not match the expected next
    /// value. Recoverable: the audio is retained and accumulation continues.
    #[error("sequence gap for {speaker}: expected {expected}, got {got}")]
    SequenceGap {
        speaker: SpeakerId,
        expected: u64,
        got: u64,
    },

    #[error("transcription error: {0}")]
    Transcription(String),

    /// A transcription call exceeded its deadline. The stuck call finishes in
    /// place; the utterance's time slot is recorded as a placeholder entry.
    #[error("transcription for {speaker} did not finish in time")]
    TranscriptionTimeout { speaker: SpeakerId },

    #[error("session is already recording")]
    AlreadyRecording,

    #[error("session is not recording")]
    NotRecording,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ChorusError>;
