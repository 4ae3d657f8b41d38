//! Speaker identity → display label mapping.
//!
//! Labels are resolved only when materialising transcript entries, never for
//! routing. The directory is shared between the command layer (which learns
//! names from the platform) and the dispatcher's lane workers.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::buffering::chunk::SpeakerId;

/// Shared map from speaker id to display label.
#[derive(Debug, Default)]
pub struct SpeakerDirectory {
    labels: RwLock<HashMap<SpeakerId, String>>,
}

impl SpeakerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace the label for one speaker.
    pub fn register(&self, speaker: SpeakerId, label: impl Into<String>) {
        self.labels.write().insert(speaker, label.into());
    }

    /// Bulk-load an id → label map (e.g. a platform member roster).
    pub fn import(&self, roster: HashMap<SpeakerId, String>) {
        self.labels.write().extend(roster);
    }

    /// The display label for a speaker, falling back to `speaker-<id>` when
    /// unknown.
    pub fn resolve(&self, speaker: SpeakerId) -> String {
        self.labels
            .read()
            .get(&speaker)
            .cloned()
            .unwrap_or_else(|| speaker.to_string())
    }

    pub fn len(&self) -> usize {
        self.labels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.read().is_empty()
    }
}
