//! Transcription engine abstraction.
//!
//! The `Transcriber` trait decouples the dispatcher from any specific
//! backend (stub echo, local Whisper, a remote API client, etc.).
//!
//! Unlike a single-stream decoder, a session engine is invoked concurrently:
//! each speaker lane issues at most one call at a time, but calls for
//! different speakers overlap. Implementations therefore take `&self` and
//! own their internal synchronisation. Calls may block for the duration of
//! inference — the dispatcher always invokes them from a blocking thread.

pub mod stub;

pub use stub::StubTranscriber;

use std::fmt;
use std::sync::Arc;

use crate::buffering::chunk::Utterance;
use crate::error::Result;

/// Language hint passed to the engine with every utterance.
///
/// `Auto` lets the engine detect the language per utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageHint(Option<String>);

impl LanguageHint {
    pub fn auto() -> Self {
        Self(None)
    }

    pub fn tagged(code: impl Into<String>) -> Self {
        Self(Some(code.into()))
    }

    /// Normalise a user-supplied language selection.
    ///
    /// Accepts the aliases the command layer historically offered ("eng" for
    /// English); anything else is passed through lowercased.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "auto" => Self::auto(),
            "eng" | "english" => Self::tagged("en"),
            _ => Self(Some(normalized)),
        }
    }

    /// The ISO 639-1 code, or `None` for automatic detection.
    pub fn code(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_auto(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for LanguageHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().unwrap_or("auto"))
    }
}

/// Contract for transcription backends.
pub trait Transcriber: Send + Sync + 'static {
    /// One-time warm-up: load weights, prime caches. Called once before the
    /// session starts accepting audio.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be made ready.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Transcribe one utterance.
    ///
    /// Returning an empty string means "no speech recognised" and produces
    /// no transcript entry. May be called concurrently for utterances of
    /// different speakers.
    fn transcribe(&self, utterance: &Utterance, language: &LanguageHint) -> Result<String>;
}

/// Thread-safe reference-counted handle to any `Transcriber` implementor.
#[derive(Clone)]
pub struct TranscriberHandle(Arc<dyn Transcriber>);

impl TranscriberHandle {
    /// Wrap any `Transcriber` in a `TranscriberHandle`.
    pub fn new<T: Transcriber>(transcriber: T) -> Self {
        Self(Arc::new(transcriber))
    }

    pub fn warm_up(&self) -> Result<()> {
        self.0.warm_up()
    }

    pub fn transcribe(&self, utterance: &Utterance, language: &LanguageHint) -> Result<String> {
        self.0.transcribe(utterance, language)
    }
}

impl fmt::Debug for TranscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriberHandle").finish_non_exhaustive()
    }
}
