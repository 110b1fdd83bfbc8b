//! Audit records for created work items.
//!
//! Each record is one JSON file named `<yyyy-MM-dd-HH-mm-ss>_<event>.json` (UTC), with a
//! `-<n>` suffix when that name is already taken.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

use crate::error::BridgeError;

/// Payload of an audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditData {
    pub sender: String,
    pub recipient: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: AuditData,
}

/// Sink for audit records.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event_type: &str, data: AuditData) -> Result<(), BridgeError>;
}

/// Drops every record; used when no audit directory is configured.
#[derive(Debug, Default)]
pub struct NoopAuditLog;

#[async_trait]
impl AuditLog for NoopAuditLog {
    async fn record(&self, _event_type: &str, _data: AuditData) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Writes each record as a pretty-printed JSON file in a directory.
pub struct DirectoryAuditLog {
    dir: PathBuf,
}

impl DirectoryAuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// File name for a record written at `at`. `attempt` > 0 adds a `-<n>` suffix for
/// records that land in the same second.
pub fn record_file_name(at: &DateTime<Utc>, event_type: &str, attempt: u32) -> String {
    let stamp = at.format("%Y-%m-%d-%H-%M-%S");
    if attempt == 0 {
        format!("{}_{}.json", stamp, event_type)
    } else {
        format!("{}_{}-{}.json", stamp, event_type, attempt)
    }
}

/// Upper bound on same-second collisions before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

impl DirectoryAuditLog {
    /// Write `record` to a file that did not exist before; never overwrites.
    async fn write_record(&self, record: &AuditRecord) -> Result<PathBuf, BridgeError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::create_dir_all(&self.dir).await?;
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self
                .dir
                .join(record_file_name(&record.timestamp, &record.event_type, attempt));
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
            return Ok(path);
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free audit file name in {}", self.dir.display()),
        )
        .into())
    }
}

#[async_trait]
impl AuditLog for DirectoryAuditLog {
    async fn record(&self, event_type: &str, data: AuditData) -> Result<(), BridgeError> {
        let record = AuditRecord {
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            data,
        };
        let path = self.write_record(&record).await?;
        log::debug!("audit record written to {}", path.display());
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<(String, AuditData)>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, AuditData)> {
        self.records.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, event_type: &str, data: AuditData) -> Result<(), BridgeError> {
        if let Ok(mut g) = self.records.lock() {
            g.push((event_type.to_string(), data));
        }
        Ok(())
    }
}
