use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use similar::TextDiff;
use uuid::Uuid;

use super::history::SessionEntry;

/// One saved turn: the exchange itself, the settings in effect when it was
/// submitted, and a unified diff of the prompt against the previous turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEntry {
    pub turn_id: String,
    pub entry: SessionEntry,
    pub settings: Map<String, Value>,
    pub prompt_diff: Option<Vec<String>>,
}

/// On-disk record of a chat session, backing the `/save` and `/load`
/// terminal commands. Loading tolerates partial or missing payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionManifest {
    pub path: PathBuf,
    pub schema_version: u64,
    pub session_id: String,
    pub created_at: String,
    pub turns: Vec<TurnEntry>,
}

impl SessionManifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema_version: 1,
            session_id: Uuid::new_v4().to_string(),
            created_at: now_utc_iso(),
            turns: Vec::new(),
        }
    }

    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut manifest = Self::new(path.clone());
        let payload = read_json(&path).unwrap_or(Value::Object(Map::new()));
        let Some(obj) = payload.as_object() else {
            return manifest;
        };

        manifest.schema_version = obj
            .get("schema_version")
            .and_then(Value::as_u64)
            .unwrap_or(manifest.schema_version);
        manifest.session_id = obj
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(manifest.session_id);
        manifest.created_at = obj
            .get("created_at")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(manifest.created_at);

        if let Some(turns) = obj.get("turns").and_then(Value::as_array) {
            for item in turns {
                if let Ok(parsed) = serde_json::from_value::<TurnEntry>(item.clone()) {
                    manifest.turns.push(parsed);
                }
            }
        }
        manifest
    }

    pub fn record(&mut self, entry: SessionEntry, settings: Map<String, Value>) -> TurnEntry {
        let prompt_diff = prompt_diff(
            self.turns.last().map(|turn| turn.entry.prompt.as_str()),
            &entry.prompt,
        );
        let turn = TurnEntry {
            turn_id: format!("t{}", self.turns.len() + 1),
            entry,
            settings,
            prompt_diff,
        };
        self.turns.push(turn.clone());
        turn
    }

    /// The exchanges in saved order, for restoring the in-memory history.
    pub fn entries(&self) -> Vec<SessionEntry> {
        self.turns.iter().map(|turn| turn.entry.clone()).collect()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let mut payload = Map::new();
        payload.insert(
            "schema_version".to_string(),
            Value::Number(self.schema_version.into()),
        );
        payload.insert(
            "session_id".to_string(),
            Value::String(self.session_id.clone()),
        );
        payload.insert(
            "created_at".to_string(),
            Value::String(self.created_at.clone()),
        );
        payload.insert(
            "turns".to_string(),
            Value::Array(
                self.turns
                    .iter()
                    .map(|turn| serde_json::to_value(turn).unwrap_or(Value::Null))
                    .collect(),
            ),
        );
        write_json(&self.path, Value::Object(payload))
    }
}

fn prompt_diff(prev: Option<&str>, curr: &str) -> Option<Vec<String>> {
    let prev = prev?;
    let diff = TextDiff::from_lines(prev, curr);
    let rendered = diff.unified_diff().header("prev", "curr").to_string();
    let lines = rendered
        .lines()
        .map(str::to_string)
        .collect::<Vec<String>>();
    Some(lines)
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json(path: &Path, payload: Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&payload)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::SessionManifest;
    use crate::session::SessionEntry;

    fn settings(model: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("model".to_string(), Value::String(model.to_string()));
        map
    }

    #[test]
    fn manifest_turns_roundtrip() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("session.json");
        let mut manifest = SessionManifest::new(&path);

        let first = SessionEntry::new("write a loop", "for i in ...", "coding", "gemini-2.0-flash");
        manifest.record(first.clone(), settings("gemini-2.0-flash"));
        let second =
            SessionEntry::new("write a faster loop", "while ...", "coding", "gemini-2.0-flash");
        manifest.record(second, settings("gemini-2.0-flash"));
        manifest.save()?;

        let loaded = SessionManifest::load(&path);
        assert_eq!(loaded.session_id, manifest.session_id);
        assert_eq!(loaded.turns.len(), 2);
        assert_eq!(loaded.turns[0].entry.prompt, "write a loop");
        assert_eq!(loaded.turns[0].prompt_diff, None);
        assert!(loaded.turns[1].prompt_diff.is_some());
        assert_eq!(
            loaded.turns[1].settings.get("model"),
            Some(&json!("gemini-2.0-flash"))
        );
        assert_eq!(loaded.entries()[0], first);
        Ok(())
    }

    #[test]
    fn load_of_missing_file_starts_fresh() {
        let manifest = SessionManifest::load("/nonexistent/session.json");
        assert_eq!(manifest.schema_version, 1);
        assert!(manifest.turns.is_empty());
    }
}
