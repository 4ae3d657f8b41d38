//! `StubTranscriber` — placeholder backend that echoes metadata without real
//! inference.
//!
//! Lets the full session pipeline be exercised end-to-end before a speech
//! backend is wired in.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::buffering::chunk::Utterance;
use crate::error::Result;
use crate::transcribe::{LanguageHint, Transcriber};

/// Echo-style stub engine.
///
/// Emits `"[stub <N>: <samples> samples @ <rate> Hz, lang=<hint>]"` for every
/// utterance of non-trivial length, and empty text (no entry) below that.
pub struct StubTranscriber {
    utterances: AtomicU64,
}

impl StubTranscriber {
    pub fn new() -> Self {
        Self {
            utterances: AtomicU64::new(0),
        }
    }
}

impl Default for StubTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for StubTranscriber {
    fn warm_up(&self) -> Result<()> {
        debug!("StubTranscriber::warm_up — no-op");
        Ok(())
    }

    fn transcribe(&self, utterance: &Utterance, language: &LanguageHint) -> Result<String> {
        if utterance.samples.len() < 160 {
            return Ok(String::new());
        }

        let n = self.utterances.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!(
            "[stub {n}: {} samples @ {} Hz, lang={language}]",
            utterance.samples.len(),
            utterance.sample_rate,
        ))
    }
}
