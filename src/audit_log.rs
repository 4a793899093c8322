//! Append-only JSON-lines audit trail of every flow outcome.
//!
//! Each line is the object returned to the chat flow plus a `timestamp`.
//! Writes are fire-and-forget: a failed append is reported through tracing
//! and never reaches the caller.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStream {
    Duplicates,
    CreateOpportunity,
}

impl AuditStream {
    pub fn file_name(&self) -> &'static str {
        match self {
            AuditStream::Duplicates => "duplicates.log",
            AuditStream::CreateOpportunity => "createOpportunity.log",
        }
    }
}

#[derive(Serialize)]
struct AuditEntry<'a, T: Serialize> {
    timestamp: String,
    #[serde(flatten)]
    info: &'a T,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    /// Opens the audit directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, stream: AuditStream) -> PathBuf {
        self.dir.join(stream.file_name())
    }

    /// Queues one entry for appending and returns immediately.
    pub fn record<T: Serialize>(&self, stream: AuditStream, info: &T) {
        let entry = match serde_json::to_value(info) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!("Failed to serialize {} entry: {}", stream.file_name(), e);
                return;
            }
        };
        let audit = self.clone();
        tokio::spawn(async move {
            if let Err(e) = audit.append(stream, &entry).await {
                tracing::error!("Failed to write {}: {}", audit.path(stream).display(), e);
            }
        });
    }

    /// Appends one entry and waits for the write.
    pub async fn append<T: Serialize>(&self, stream: AuditStream, info: &T) -> std::io::Result<()> {
        let line = render_line(info, Utc::now())?;
        append_line(&self.path(stream), &line).await
    }
}

fn render_line<T: Serialize>(info: &T, at: DateTime<Utc>) -> serde_json::Result<String> {
    let entry = AuditEntry {
        timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        info,
    };
    let mut line = serde_json::to_string(&entry)?;
    line.push('\n');
    Ok(line)
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}
