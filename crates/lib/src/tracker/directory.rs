//! Dry-run tracker: writes each ticket as a JSON file instead of calling the API.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;
use crate::ticket::Ticket;
use crate::tracker::TicketTracker;

#[derive(Serialize)]
struct StoredTicket<'a> {
    project: &'a str,
    #[serde(flatten)]
    ticket: &'a Ticket,
}

pub struct DirectoryTracker {
    dir: PathBuf,
}

impl DirectoryTracker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl TicketTracker for DirectoryTracker {
    async fn create(
        &self,
        ticket: &Ticket,
        project: &str,
        cancel: &CancellationToken,
    ) -> Result<(), BridgeError> {
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        let json = serde_json::to_string_pretty(&StoredTicket { project, ticket })
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!(
            "{}-{}.json",
            Utc::now().format("%Y-%m-%d-%H-%M-%S"),
            uuid::Uuid::new_v4()
        );
        let path = self.dir.join(name);
        tokio::fs::write(&path, json).await?;
        log::info!("ticket written to {}", path.display());
        Ok(())
    }
}
