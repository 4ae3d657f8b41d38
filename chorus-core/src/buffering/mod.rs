//! Per-speaker audio buffering.
//!
//! [`chunk`] defines the units of work flowing from the capture layer into
//! the dispatcher; [`speaker`] accumulates one speaker's chunks until a
//! flush condition yields a complete [`chunk::Utterance`].

pub mod chunk;
pub mod speaker;

pub use chunk::{AudioChunk, SpeakerId, Utterance};
pub use speaker::{FlushConfig, PerSpeakerBuffer};
