//! Append-only operations log: one JSON record per safety-relevant action,
//! stamped at write time. This is the freeform sibling of the typed audit
//! sinks in [`crate::events`].

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use cordon_protocol::AuditEvent;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::events::AuditSink;

const DEFAULT_FILE_NAME: &str = "operations.jsonl";

#[derive(Debug, Clone)]
pub struct HistoryLogger {
    history_dir: PathBuf,
    file_name: String,
}

impl HistoryLogger {
    pub fn new(history_dir: PathBuf) -> Self {
        Self {
            history_dir,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.history_dir.join(&self.file_name)
    }

    /// Append one freeform record, adding a millisecond `ts` field.
    pub async fn log(&self, event: Value) -> io::Result<()> {
        let mut record = match event {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("event".to_string(), other);
                map
            }
        };
        record.insert(
            "ts".to_string(),
            Value::from(chrono::Utc::now().timestamp_millis()),
        );
        self.append_line(&Value::Object(record)).await
    }

    async fn append_line(&self, record: &Value) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.history_dir).await?;
        let mut line = serde_json::to_vec(record).map_err(io::Error::other)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path())
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}

#[async_trait]
impl AuditSink for HistoryLogger {
    async fn write(&self, event: &AuditEvent) -> io::Result<()> {
        let record = serde_json::to_value(event).map_err(io::Error::other)?;
        self.append_line(&record).await
    }
}
