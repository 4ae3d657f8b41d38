//! Typed audio units passed from the capture layer to the dispatcher.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Stable identifier for one audio source (platform user id).
///
/// Used as the routing and grouping key for the session's duration. Display
/// labels are resolved separately through the speaker directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SpeakerId(pub u64);

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speaker-{}", self.0)
    }
}

/// One arriving unit of audio for a single speaker.
///
/// Immutable once created; ownership transfers from the capture layer to the
/// dispatcher.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub speaker: SpeakerId,
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 48000).
    pub sample_rate: u32,
    /// Arrival time relative to the session epoch.
    pub timestamp: Duration,
    /// Monotonic per-speaker sequence number assigned by the capture layer,
    /// used to detect gaps and reordering.
    pub sequence: u64,
}

impl AudioChunk {
    pub fn new(
        speaker: SpeakerId,
        samples: Vec<f32>,
        sample_rate: u32,
        timestamp: Duration,
        sequence: u64,
    ) -> Self {
        Self {
            speaker,
            samples,
            sample_rate,
            timestamp,
            sequence,
        }
    }

    /// Returns the audio duration of this chunk.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Returns true if the chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A contiguous span of one speaker's audio accumulated between flushes.
///
/// Created by a buffer flush; consumed exactly once by the transcription
/// engine; never mutated after creation.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub speaker: SpeakerId,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Arrival time of the first contributing chunk.
    pub start: Duration,
    /// End of the last contributing chunk (arrival time plus audio length).
    pub end: Duration,
}

impl Utterance {
    /// Wall-clock span covered by this utterance.
    pub fn span(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// Audio duration held in the sample buffer.
    pub fn audio_duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_duration_follows_sample_rate() {
        let chunk = AudioChunk::new(
            SpeakerId(1),
            vec![0.0; 16_000],
            16_000,
            Duration::ZERO,
            0,
        );
        assert_eq!(chunk.duration(), Duration::from_secs(1));
    }

    #[test]
    fn speaker_id_serializes_transparently() {
        let json = serde_json::to_value(SpeakerId(42)).expect("serialize speaker id");
        assert_eq!(json, 42);
        let back: SpeakerId = serde_json::from_value(json).expect("deserialize speaker id");
        assert_eq!(back, SpeakerId(42));
    }

    #[test]
    fn speaker_id_display_is_stable() {
        assert_eq!(SpeakerId(7).to_string(), "speaker-7");
    }
}
