//! Composable audit sinks. Every safety-relevant action is surrounded by
//! events written through an [`AuditSink`]; sink failures are logged and
//! never block the primary operation.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use cordon_protocol::AuditEvent;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, event: &AuditEvent) -> io::Result<()>;
}

/// Write through a sink, demoting failures to a warning. Audit delivery must
/// never abort the action it describes.
pub async fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    let kind = event.kind;
    if let Err(err) = sink.write(&event).await {
        tracing::warn!("failed to write {kind} audit event: {err}");
    }
}

fn to_jsonl(event: &AuditEvent) -> io::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(event).map_err(io::Error::other)?;
    line.push(b'\n');
    Ok(line)
}

/// JSON-lines events on stdout, for machine consumers of the CLI.
#[derive(Debug, Default)]
pub struct JsonlStdoutSink;

#[async_trait]
impl AuditSink for JsonlStdoutSink {
    async fn write(&self, event: &AuditEvent) -> io::Result<()> {
        let line = to_jsonl(event)?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&line).await?;
        stdout.flush().await
    }
}

/// Append-only JSON-lines file.
#[derive(Debug)]
pub struct FileEventSink {
    path: PathBuf,
}

impl FileEventSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl AuditSink for FileEventSink {
    async fn write(&self, event: &AuditEvent) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&to_jsonl(event)?).await?;
        file.flush().await
    }
}

/// Fan-out: every event goes to every sink, in registration order.
#[derive(Default)]
pub struct MultiEventSink {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl MultiEventSink {
    pub fn new(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn AuditSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl AuditSink for MultiEventSink {
    async fn write(&self, event: &AuditEvent) -> io::Result<()> {
        // One failing sink must not starve the others, so keep delivering
        // and report the first error afterwards.
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = sink.write(event).await
                && first_err.is_none()
            {
                first_err = Some(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AuditSink for NullSink {
    async fn write(&self, _event: &AuditEvent) -> io::Result<()> {
        Ok(())
    }
}
