use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use flowrun_core::error::Result;
use flowrun_core::types::{LogEntry, LogLevel, RunId};

/// Marker substituted for structure that recurses past `MAX_DEPTH`.
pub const CIRCULAR_MARKER: &str = "[Circular]";

/// Nesting depth beyond which attached data is treated as self-referential.
pub const MAX_DEPTH: usize = 64;

/// Append-only record of what happened during a run.
///
/// Entries are never reordered or mutated after `append`. Each append is
/// mirrored to `tracing` at the matching level.
#[derive(Debug, Default)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, sanitising any attached data first.
    pub fn append(&mut self, node_id: &str, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!(node_id = %node_id, "{}", message),
            LogLevel::Warn => warn!(node_id = %node_id, "{}", message),
            LogLevel::Error => error!(node_id = %node_id, "{}", message),
        }
        self.entries.push(LogEntry {
            node_id: node_id.to_string(),
            timestamp: Utc::now(),
            level,
            message,
            data: data.map(|v| sanitize(&v)),
        });
    }

    /// Append with data taken from any serialisable value.
    pub fn append_serialized<T: Serialize + ?Sized>(
        &mut self,
        node_id: &str,
        level: LogLevel,
        message: impl Into<String>,
        data: &T,
    ) {
        let value = safe_serialize(data);
        self.append(node_id, level, message, Some(value));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

/// Serialise arbitrary data without failing.
///
/// Serialisation errors become an `{"error": ...}` object; overly deep
/// structure is cut with `CIRCULAR_MARKER`.
pub fn safe_serialize<T: Serialize + ?Sized>(data: &T) -> Value {
    match serde_json::to_value(data) {
        Ok(value) => sanitize(&value),
        Err(e) => serde_json::json!({ "error": format!("unserializable: {}", e) }),
    }
}

/// Copy `value`, replacing anything nested deeper than `MAX_DEPTH`.
pub fn sanitize(value: &Value) -> Value {
    sanitize_at(value, 0)
}

fn sanitize_at(value: &Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::String(CIRCULAR_MARKER.to_string());
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize_at(v, depth + 1)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_at(v, depth + 1)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

/// Write log entries as JSONL to `{dir}/{run_id}.jsonl`.
///
/// Opened in append mode and flushed after every line, so a partially
/// written file still holds complete entries.
pub async fn write_jsonl(dir: &Path, run_id: &RunId, entries: &[LogEntry]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.jsonl", run_id));

    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    let mut writer = tokio::io::BufWriter::new(file);

    for entry in entries {
        let line = format!("{}\n", serde_json::to_string(entry)?);
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }

    debug!(path = %path.display(), entries = entries.len(), "Run log exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::json;

    #[test]
    fn test_append_preserves_order() {
        let mut log = RunLog::new();
        log.append("a", LogLevel::Info, "first", None);
        log.append("b", LogLevel::Error, "second", Some(json!({"x": 1})));
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].message, "first");
        assert_eq!(log.entries()[1].node_id, "b");
        assert_eq!(log.entries()[1].data, Some(json!({"x": 1})));
    }

    #[test]
    fn test_deep_structure_gets_marker() {
        let mut value = json!("leaf");
        for _ in 0..(MAX_DEPTH + 10) {
            value = json!({ "next": value });
        }
        let cleaned = sanitize(&value);

        let mut cursor = &cleaned;
        let mut depth = 0;
        while let Some(next) = cursor.get("next") {
            cursor = next;
            depth += 1;
        }
        assert_eq!(depth, MAX_DEPTH);
        assert_eq!(cursor, &json!(CIRCULAR_MARKER));
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("refers to itself"))
        }
    }

    #[test]
    fn test_unserializable_does_not_fail() {
        let mut log = RunLog::new();
        log.append_serialized("n", LogLevel::Info, "result", &Unserializable);
        let data = log.entries()[0].data.as_ref().unwrap();
        assert!(data["error"].as_str().unwrap().contains("refers to itself"));
    }

    #[tokio::test]
    async fn test_jsonl_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new();
        log.append("a", LogLevel::Info, "started", None);
        log.append("a", LogLevel::Warn, "slow", Some(json!({"ms": 900})));

        let run_id = RunId::new();
        let path = write_jsonl(dir.path(), &run_id, log.entries()).await.unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: LogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.level, LogLevel::Warn);
        assert_eq!(second.data, Some(json!({"ms": 900})));
    }
}
