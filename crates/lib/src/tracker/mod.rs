//! Ticket submission: tracker backends plus the audit trail for created items.

mod devops;
mod directory;

pub use devops::{basic_auth_header, work_item_patch, DevOpsTracker};
pub use directory::DirectoryTracker;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditData, AuditLog};
use crate::config::TrackerTarget;
use crate::error::BridgeError;
use crate::report::Reporter;
use crate::ticket::Ticket;

/// Audit event name for a created work item.
pub const BUG_EVENT: &str = "bug";

/// Backend that files tickets.
#[async_trait]
pub trait TicketTracker: Send + Sync {
    /// Create `ticket` in `project`. Must give up with [`BridgeError::Cancelled`] once `cancel` fires.
    async fn create(
        &self,
        ticket: &Ticket,
        project: &str,
        cancel: &CancellationToken,
    ) -> Result<(), BridgeError>;
}

/// Build the tracker for the configured target.
pub fn build_tracker(target: &TrackerTarget) -> Result<Arc<dyn TicketTracker>, BridgeError> {
    Ok(match target {
        TrackerTarget::DevOps(endpoint) => Arc::new(DevOpsTracker::new(endpoint)?),
        TrackerTarget::Directory(dir) => Arc::new(DirectoryTracker::new(dir.clone())),
    })
}

/// Files tickets and records one audit entry per created ticket.
#[derive(Clone)]
pub struct Submitter {
    tracker: Arc<dyn TicketTracker>,
    audit: Arc<dyn AuditLog>,
    reporter: Arc<dyn Reporter>,
}

impl Submitter {
    pub fn new(
        tracker: Arc<dyn TicketTracker>,
        audit: Arc<dyn AuditLog>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            tracker,
            audit,
            reporter,
        }
    }

    /// Create the work item, then audit it. Audit failures are reported and do not fail the call.
    pub async fn submit(
        &self,
        ticket: &Ticket,
        project: &str,
        cancel: &CancellationToken,
    ) -> Result<(), BridgeError> {
        self.tracker.create(ticket, project, cancel).await?;

        let data = AuditData {
            sender: ticket.attributes.sender.clone().unwrap_or_default(),
            recipient: ticket.attributes.recipient.clone().unwrap_or_default(),
            title: ticket.title.clone(),
            content: ticket.content.clone(),
        };
        if let Err(e) = self.audit.record(BUG_EVENT, data).await {
            self.reporter.record_failure(&e);
        }
        Ok(())
    }
}
