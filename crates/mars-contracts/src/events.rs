use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::params::GenerationParams;

pub type EventPayload = Map<String, Value>;

/// Append-only writer for the session's `events.jsonl`, one compact JSON
/// object per line. Call sites use the typed helpers below; `emit` is the
/// escape hatch for ad-hoc events.
///
/// Every event carries `type`, `session_id` and `ts`. Those defaults fill in
/// around the caller payload, so a payload that already names one of them
/// wins.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Lifecycle marker with no fields beyond the defaults
    /// (`session_started`, `session_saved`, `logged_out`, ...).
    pub fn lifecycle(&self, event_type: &str) -> anyhow::Result<Value> {
        self.emit(event_type, EventPayload::new())
    }

    pub fn generation_started(
        &self,
        category: &str,
        model: Option<&str>,
        params: GenerationParams,
    ) -> anyhow::Result<Value> {
        self.emit(
            "generation_started",
            object(serde_json::json!({
                "category": category,
                "model": model,
                "temperature": params.temperature,
                "max_tokens": params.max_tokens,
            })),
        )
    }

    pub fn generation_completed(&self, model: &str, chars: usize) -> anyhow::Result<Value> {
        self.emit(
            "generation_completed",
            object(serde_json::json!({ "model": model, "chars": chars })),
        )
    }

    pub fn generation_failed(&self, error: &str) -> anyhow::Result<Value> {
        self.emit(
            "generation_failed",
            object(serde_json::json!({ "error": error })),
        )
    }

    pub fn file_analysis_started(&self, file: &str) -> anyhow::Result<Value> {
        self.emit(
            "file_analysis_started",
            object(serde_json::json!({ "file": file })),
        )
    }

    pub fn file_analysis_progress(&self, percent: u8) -> anyhow::Result<Value> {
        self.emit(
            "file_analysis_progress",
            object(serde_json::json!({ "percent": percent })),
        )
    }

    pub fn file_analysis_completed(&self, summary_chars: usize) -> anyhow::Result<Value> {
        self.emit(
            "file_analysis_completed",
            object(serde_json::json!({ "summary_chars": summary_chars })),
        )
    }

    pub fn file_analysis_failed(&self, error: &str) -> anyhow::Result<Value> {
        self.emit(
            "file_analysis_failed",
            object(serde_json::json!({ "error": error })),
        )
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = payload;
        event
            .entry("type".to_string())
            .or_insert_with(|| Value::String(event_type.to_string()));
        event
            .entry("session_id".to_string())
            .or_insert_with(|| Value::String(self.inner.session_id.clone()));
        event
            .entry("ts".to_string())
            .or_insert_with(|| Value::String(now_utc_iso()));
        self.append(Value::Object(event))
    }

    fn append(&self, event: Value) -> anyhow::Result<Value> {
        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        writeln!(file, "{line}")?;
        Ok(event)
    }
}

fn object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use crate::params::{GenerationParams, ResponseLength, TemperatureMode};

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        let mut payload = EventPayload::new();
        payload.insert("model".to_string(), Value::String("gemini-2.0-flash".to_string()));
        let emitted = writer.emit("generation_started", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("generation_started".to_string()));
        assert_eq!(parsed["session_id"], Value::String("session-123".to_string()));
        assert_eq!(parsed["model"], Value::String("gemini-2.0-flash".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_overrides_default_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-123");

        let mut payload = EventPayload::new();
        payload.insert("session_id".to_string(), Value::String("other".to_string()));
        payload.insert("ts".to_string(), Value::String("fixed".to_string()));
        let emitted = writer.emit("generation_started", payload)?;

        assert_eq!(emitted["session_id"], Value::String("other".to_string()));
        assert_eq!(emitted["ts"], Value::String("fixed".to_string()));
        assert_eq!(
            emitted["type"],
            Value::String("generation_started".to_string())
        );
        Ok(())
    }

    #[test]
    fn generation_events_carry_dispatch_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-123");

        let params = GenerationParams::resolve(TemperatureMode::Precise, ResponseLength::Short);
        let started = writer.generation_started("coding", None, params)?;
        assert_eq!(started["category"], Value::String("coding".to_string()));
        assert_eq!(started["model"], Value::Null);
        assert_eq!(started["temperature"], serde_json::json!(0.2));
        assert_eq!(started["max_tokens"], serde_json::json!(500));

        let failed = writer.generation_failed("backend unavailable")?;
        assert_eq!(failed["type"], Value::String("generation_failed".to_string()));
        assert_eq!(
            failed["error"],
            Value::String("backend unavailable".to_string())
        );
        Ok(())
    }

    #[test]
    fn emit_appends_lines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.lifecycle("session_started")?;
        writer.file_analysis_progress(50)?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0])?;
        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(first["type"], Value::String("session_started".to_string()));
        assert_eq!(second["type"], Value::String("file_analysis_progress".to_string()));
        assert_eq!(second["percent"], serde_json::json!(50));
        Ok(())
    }
}
