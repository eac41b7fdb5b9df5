//! Per-session audit archives: one append-only JSON-lines file per logical
//! session, replayable in write order.

use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use async_trait::async_trait;
use cordon_protocol::AuditEvent;
use tokio::io::AsyncWriteExt;

use crate::events::AuditSink;

#[derive(Debug, Clone)]
pub struct SessionStore {
    base_dir: PathBuf,
}

impl SessionStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.jsonl"))
    }

    pub async fn append(&self, id: &str, event: &AuditEvent) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let mut line = serde_json::to_vec(event).map_err(io::Error::other)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.session_path(id))
            .await?;
        file.write_all(&line).await
    }

    /// Replay a session's events in the order they were appended. Lines that
    /// fail to parse are skipped rather than poisoning the replay.
    pub async fn read(&self, id: &str) -> io::Result<Vec<AuditEvent>> {
        let content = tokio::fs::read_to_string(self.session_path(id)).await?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Most recently written session, by file modification time.
    pub async fn last_session_id(&self) -> io::Result<Option<String>> {
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut latest: Option<(String, SystemTime)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            if latest.as_ref().is_none_or(|(_, ts)| modified > *ts) {
                latest = Some((stem.to_string(), modified));
            }
        }
        Ok(latest.map(|(id, _)| id))
    }
}

/// Adapter so a store-plus-session-id pair can sit in a sink fan-out.
#[derive(Debug, Clone)]
pub struct SessionEventSink {
    store: SessionStore,
    session_id: String,
}

impl SessionEventSink {
    pub fn new(store: SessionStore, session_id: String) -> Self {
        Self { store, session_id }
    }
}

#[async_trait]
impl AuditSink for SessionEventSink {
    async fn write(&self, event: &AuditEvent) -> io::Result<()> {
        self.store.append(&self.session_id, event).await
    }
}
