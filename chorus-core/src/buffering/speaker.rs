//! Per-speaker accumulation with silence-gap and duration flush conditions.
//!
//! ## State machine
//!
//! ```text
//! append ──► current accumulation grows
//!    │
//!    ├─ gap ≥ silence_gap observed on append
//!    │      └─► current is sealed; the new chunk starts a fresh accumulation
//!    │
//! maybe_flush ──► sealed utterance, or current when silent/oversize
//! force_flush ──► everything buffered, as one utterance
//! ```
//!
//! A chunk arriving while a sealed utterance awaits pickup never touches the
//! sealed samples; it only ever grows the fresh accumulation.
//!
//! Not internally thread-safe: the dispatcher serialises access through the
//! per-speaker lock.

use std::collections::VecDeque;
use std::time::Duration;

use crate::buffering::chunk::{AudioChunk, SpeakerId, Utterance};
use crate::error::{ChorusError, Result};

/// Flush thresholds for per-speaker accumulation.
#[derive(Debug, Clone, Copy)]
pub struct FlushConfig {
    /// Silence gap after which the current accumulation becomes an utterance.
    /// Default: 300 ms.
    pub silence_gap: Duration,
    /// Maximum accumulated audio before a forced flush. Default: 30 s.
    pub max_utterance: Duration,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            silence_gap: Duration::from_millis(300),
            max_utterance: Duration::from_secs(30),
        }
    }
}

/// The accumulation currently growing (or sealed) for one speaker.
#[derive(Debug)]
struct Accumulation {
    samples: Vec<f32>,
    sample_rate: u32,
    start: Duration,
    end: Duration,
}

impl Accumulation {
    fn from_chunk(chunk: AudioChunk) -> Self {
        let start = chunk.timestamp;
        let end = chunk.timestamp + chunk.duration();
        Self {
            samples: chunk.samples,
            sample_rate: chunk.sample_rate,
            start,
            end,
        }
    }

    fn push(&mut self, chunk: AudioChunk) {
        self.end = chunk.timestamp + chunk.duration();
        self.samples.extend_from_slice(&chunk.samples);
    }

    fn audio_duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    fn into_utterance(self, speaker: SpeakerId) -> Utterance {
        Utterance {
            speaker,
            samples: self.samples,
            sample_rate: self.sample_rate,
            start: self.start,
            end: self.end,
        }
    }
}

/// Accumulates one speaker's audio until a flush condition is met.
#[derive(Debug)]
pub struct PerSpeakerBuffer {
    speaker: SpeakerId,
    config: FlushConfig,
    /// Accumulation still receiving chunks.
    current: Option<Accumulation>,
    /// Accumulations sealed by a silence gap, awaiting the next flush call.
    sealed: VecDeque<Accumulation>,
    /// Expected sequence number of the next chunk, once one has been seen.
    next_sequence: Option<u64>,
}

impl PerSpeakerBuffer {
    pub fn new(speaker: SpeakerId, config: FlushConfig) -> Self {
        Self {
            speaker,
            config,
            current: None,
            sealed: VecDeque::new(),
            next_sequence: None,
        }
    }

    pub fn speaker(&self) -> SpeakerId {
        self.speaker
    }

    /// Append a chunk's samples to the accumulation.
    ///
    /// If the gap between this chunk and the previous chunk's end is at least
    /// `silence_gap`, the current accumulation is sealed first and the chunk
    /// starts a fresh one.
    ///
    /// Returns `ChorusError::SequenceGap` when the chunk's sequence number
    /// does not match the expected next value. The audio is retained either
    /// way; the caller logs the gap and continues.
    pub fn append(&mut self, chunk: AudioChunk) -> Result<()> {
        if let Some(current) = self.current.take() {
            let gap = chunk.timestamp.saturating_sub(current.end);
            if gap >= self.config.silence_gap {
                self.sealed.push_back(current);
            } else {
                self.current = Some(current);
            }
        }

        let sequence_check = match self.next_sequence {
            Some(expected) if chunk.sequence != expected => Err(ChorusError::SequenceGap {
                speaker: self.speaker,
                expected,
                got: chunk.sequence,
            }),
            _ => Ok(()),
        };
        self.next_sequence = Some(chunk.sequence + 1);

        match self.current.as_mut() {
            Some(current) => current.push(chunk),
            None => self.current = Some(Accumulation::from_chunk(chunk)),
        }

        sequence_check
    }

    /// Yield one completed utterance, if a flush condition is met.
    ///
    /// Sealed utterances are handed out first, in seal order. Otherwise the
    /// current accumulation is flushed when no audio has arrived for
    /// `silence_gap`, or when it holds at least `max_utterance` of audio.
    pub fn maybe_flush(&mut self, now: Duration) -> Option<Utterance> {
        if let Some(sealed) = self.sealed.pop_front() {
            return Some(sealed.into_utterance(self.speaker));
        }

        let current = self.current.as_ref()?;
        let silent = now.saturating_sub(current.end) >= self.config.silence_gap;
        let oversize = current.audio_duration() >= self.config.max_utterance;
        if silent || oversize {
            return self
                .current
                .take()
                .map(|acc| acc.into_utterance(self.speaker));
        }
        None
    }

    /// Unconditionally yield everything buffered as a single utterance.
    ///
    /// Used at session stop and speaker leave. Returns `None` when empty.
    pub fn force_flush(&mut self) -> Option<Utterance> {
        let mut parts: Vec<Accumulation> = self.sealed.drain(..).collect();
        if let Some(current) = self.current.take() {
            parts.push(current);
        }

        let mut iter = parts.into_iter();
        let mut merged = iter.next()?;
        for part in iter {
            merged.samples.extend_from_slice(&part.samples);
            merged.end = part.end;
        }
        Some(merged.into_utterance(self.speaker))
    }

    /// Returns true when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.sealed.is_empty()
    }

    /// Total samples buffered across sealed and current accumulations.
    pub fn buffered_samples(&self) -> usize {
        let sealed: usize = self.sealed.iter().map(|a| a.samples.len()).sum();
        sealed + self.current.as_ref().map_or(0, |a| a.samples.len())
    }
}
