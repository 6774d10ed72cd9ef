use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed exchange. Entries exist only for terminal successes; a
/// failed dispatch never reaches the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: String,
    pub prompt: String,
    pub output: String,
    pub category: String,
    pub model: String,
    pub image_url: Option<String>,
    pub created_at: String,
}

impl SessionEntry {
    pub fn new(prompt: &str, output: &str, category: &str, model: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt: prompt.to_string(),
            output: output.to_string(),
            category: category.to_string(),
            model: model.to_string(),
            image_url: None,
            created_at: now_utc_iso(),
        }
    }

    pub fn with_image(mut self, image_url: &str) -> Self {
        self.image_url = Some(image_url.to_string());
        self
    }
}

/// In-memory, append-only exchange log plus the single-submission guard.
/// The `loading` flag only gates re-submission; it is not a lock.
#[derive(Debug, Default)]
pub struct SessionHistory {
    entries: Vec<SessionEntry>,
    loading: bool,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SessionEntry> {
        self.entries.get(index)
    }

    pub fn push(&mut self, entry: SessionEntry) {
        self.entries.push(entry);
    }

    /// Entries are never removed individually, only bulk-cleared.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn replace(&mut self, entries: Vec<SessionEntry>) {
        self.entries = entries;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns false when a submission is already in flight.
    pub fn begin_submission(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn finish_submission(&mut self) {
        self.loading = false;
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
