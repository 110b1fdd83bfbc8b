//! Orchestration of one inbound email: validate, filter, resolve, submit.
//!
//! Received -> Validated -> FilterChecked -> Resolved -> Submitted -> Done.
//! A failed allow-list check ends in `Rejected`, which is a successful no-op.
//! Any error ends the run and is returned to the caller.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::anonymize::pseudo_anonymize;
use crate::audit::{AuditLog, DirectoryAuditLog, NoopAuditLog};
use crate::config::Settings;
use crate::email::{normalize, RawEmail};
use crate::error::BridgeError;
use crate::filter::is_allowed;
use crate::report::Reporter;
use crate::resolver::{resolve, ResolutionConfig};
use crate::ticket::{InboundMessage, Ticket};
use crate::tracker::{build_tracker, Submitter};

/// Processing stage reached by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    FilterChecked,
    Resolved,
    Submitted,
    Done,
}

/// Which allow-list turned the message away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Sender,
    Recipient,
}

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { project: String, title: String },
    Rejected(Rejection),
}

/// Allow-list strings; `None` allows everyone.
#[derive(Debug, Clone, Default)]
pub struct AccessRules {
    pub allowed_senders: Option<String>,
    pub allowed_recipients: Option<String>,
}

/// Turns inbound emails into work items. Holds only read-only state; one instance serves
/// every request.
#[derive(Clone)]
pub struct Bridge {
    access: AccessRules,
    resolution: ResolutionConfig,
    submitter: Submitter,
    reporter: Arc<dyn Reporter>,
}

impl Bridge {
    pub fn new(
        access: AccessRules,
        resolution: ResolutionConfig,
        submitter: Submitter,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            access,
            resolution,
            submitter,
            reporter,
        }
    }

    /// Wire tracker and audit log from resolved settings.
    pub fn from_settings(settings: &Settings, reporter: Arc<dyn Reporter>) -> Result<Self, BridgeError> {
        let tracker = build_tracker(&settings.tracker)?;
        let audit: Arc<dyn AuditLog> = match &settings.audit_dir {
            Some(dir) => Arc::new(DirectoryAuditLog::new(dir.clone())),
            None => Arc::new(NoopAuditLog),
        };
        let access = AccessRules {
            allowed_senders: settings.allowed_senders.clone(),
            allowed_recipients: settings.allowed_recipients.clone(),
        };
        Ok(Self::new(
            access,
            settings.resolution.clone(),
            Submitter::new(tracker, audit, reporter.clone()),
            reporter,
        ))
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    /// Normalize a raw webhook payload and process it.
    pub async fn handle(
        &self,
        raw: &RawEmail,
        cancel: &CancellationToken,
    ) -> Result<Outcome, BridgeError> {
        let message = match normalize(raw, self.reporter.as_ref()) {
            Ok(m) => m,
            Err(e) => {
                self.reporter.record_failure(&e);
                return Err(e);
            }
        };
        self.process(message, cancel).await
    }

    /// Run one message through validation, filtering, resolution and submission.
    pub async fn process(
        &self,
        message: InboundMessage,
        cancel: &CancellationToken,
    ) -> Result<Outcome, BridgeError> {
        let mut stage = Stage::Received;
        let result = self.run(message, cancel, &mut stage).await;
        if let Err(ref e) = result {
            log::debug!("email processing failed after stage {:?}", stage);
            self.reporter.record_failure(e);
        }
        result
    }

    async fn run(
        &self,
        message: InboundMessage,
        cancel: &CancellationToken,
        stage: &mut Stage,
    ) -> Result<Outcome, BridgeError> {
        validate(&message)?;
        *stage = Stage::Validated;

        if !is_allowed(&message.from, self.access.allowed_senders.as_deref()) {
            let sender = pseudo_anonymize(&message.from);
            log::warn!("non-whitelisted sender: {}", sender);
            self.reporter
                .record_event("sender_rejected", &[("sender", sender.as_str())]);
            return Ok(Outcome::Rejected(Rejection::Sender));
        }
        if !is_allowed(&message.to, self.access.allowed_recipients.as_deref()) {
            let recipient = pseudo_anonymize(&message.to);
            log::warn!("non-whitelisted recipient: {}", recipient);
            self.reporter
                .record_event("recipient_rejected", &[("recipient", recipient.as_str())]);
            return Ok(Outcome::Rejected(Rejection::Recipient));
        }
        *stage = Stage::FilterChecked;

        let mut ticket = Ticket::from_message(&message);
        let resolution = resolve(&mut ticket, &self.resolution);
        *stage = Stage::Resolved;

        self.submitter
            .submit(&ticket, &resolution.project, cancel)
            .await?;
        *stage = Stage::Submitted;

        let sender = pseudo_anonymize(&message.from);
        log::info!(
            "work item created: project: '{}', title: '{}' by: {}",
            resolution.project,
            ticket.title,
            sender
        );
        self.reporter.record_event(
            "work_item_created",
            &[
                ("project", resolution.project.as_str()),
                ("source", resolution.source.as_str()),
                ("title", ticket.title.as_str()),
                ("sender", sender.as_str()),
            ],
        );
        *stage = Stage::Done;
        Ok(Outcome::Created {
            project: resolution.project,
            title: ticket.title,
        })
    }
}

fn validate(message: &InboundMessage) -> Result<(), BridgeError> {
    if message.from.is_empty() {
        return Err(BridgeError::Validation("from"));
    }
    if message.to.is_empty() {
        return Err(BridgeError::Validation("to"));
    }
    if message.subject.is_empty() {
        return Err(BridgeError::Validation("subject"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::report::MemoryReporter;
    use crate::resolver::ResolutionStrategy;
    use crate::tracker::TicketTracker;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTracker {
        created: Mutex<Vec<(String, Ticket)>>,
    }

    #[async_trait]
    impl TicketTracker for RecordingTracker {
        async fn create(
            &self,
            ticket: &Ticket,
            project: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), BridgeError> {
            self.created
                .lock()
                .unwrap()
                .push((project.to_string(), ticket.clone()));
            Ok(())
        }
    }

    struct Harness {
        bridge: Bridge,
        tracker: Arc<RecordingTracker>,
        audit: Arc<MemoryAuditLog>,
        reporter: Arc<MemoryReporter>,
    }

    fn harness(senders: Option<&str>, recipients: Option<&str>) -> Harness {
        let tracker = Arc::new(RecordingTracker::default());
        let audit = Arc::new(MemoryAuditLog::new());
        let reporter = Arc::new(MemoryReporter::new());
        let bridge = Bridge::new(
            AccessRules {
                allowed_senders: senders.map(str::to_string),
                allowed_recipients: recipients.map(str::to_string),
            },
            ResolutionConfig {
                explicit_project: None,
                strategy: ResolutionStrategy::SUBJECT,
            },
            Submitter::new(tracker.clone(), audit.clone(), reporter.clone()),
            reporter.clone(),
        );
        Harness {
            bridge,
            tracker,
            audit,
            reporter,
        }
    }

    fn message(from: &str, to: &str, subject: &str) -> InboundMessage {
        InboundMessage {
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            content: Some("details".to_string()),
        }
    }

    #[tokio::test]
    async fn unlisted_sender_is_rejected_silently() {
        let h = harness(Some("legit@example.com"), Some("bugs@example.com"));
        let outcome = h
            .bridge
            .process(
                message("unauthorized@example.com", "bugs@example.com", "Test"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected(Rejection::Sender));
        assert!(h.tracker.created.lock().unwrap().is_empty());
        assert!(h.audit.records().is_empty());
        assert_eq!(h.reporter.event_names(), vec!["sender_rejected"]);
        assert!(h.reporter.failures().is_empty());
    }

    #[tokio::test]
    async fn sender_domain_rule_allows_domain() {
        let h = harness(Some("@example.com"), Some("bugs@example.com"));
        let outcome = h
            .bridge
            .process(
                message("allowed@example.com", "bugs@example.com", "Test"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Created { .. }));
        assert_eq!(h.reporter.event_names(), vec!["work_item_created"]);
    }

    #[tokio::test]
    async fn sender_domain_rule_rejects_other_domains() {
        let h = harness(Some("@example.com"), Some("bugs@example.com"));
        let outcome = h
            .bridge
            .process(
                message("notallowed@example2.com", "bugs@example.com", "Test"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected(Rejection::Sender));
    }

    #[tokio::test]
    async fn unlisted_recipient_is_rejected_silently() {
        let h = harness(None, Some("bugs@example.com"));
        let outcome = h
            .bridge
            .process(
                message("anyone@example.com", "notbugs@example.com", "Test"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected(Rejection::Recipient));
        assert!(h.tracker.created.lock().unwrap().is_empty());
        assert!(h.audit.records().is_empty());
        assert_eq!(h.reporter.event_names(), vec!["recipient_rejected"]);
    }

    #[tokio::test]
    async fn open_lists_create_exactly_one_item() {
        let h = harness(None, None);
        let outcome = h
            .bridge
            .process(
                message("someone@example.com", "anyone@example.com", "[web] - login broken"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Created {
                project: "web".to_string(),
                title: "login broken".to_string(),
            }
        );
        let created = h.tracker.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "web");
        assert_eq!(created[0].1.title, "login broken");
        assert_eq!(created[0].1.attributes.project.as_deref(), Some("web"));
        assert_eq!(h.audit.records().len(), 1);
    }

    #[tokio::test]
    async fn missing_content_becomes_placeholder() {
        let h = harness(None, None);
        let mut msg = message("someone@example.com", "bugs@example.com", "crash");
        msg.content = None;
        h.bridge
            .process(msg, &CancellationToken::new())
            .await
            .unwrap();
        let created = h.tracker.created.lock().unwrap();
        assert_eq!(created[0].1.content, crate::ticket::NO_CONTENT);
    }

    #[tokio::test]
    async fn empty_fields_fail_validation() {
        let h = harness(None, None);
        for (msg, field) in [
            (message("", "b@example.com", "s"), "from"),
            (message("a@example.com", "", "s"), "to"),
            (message("a@example.com", "b@example.com", ""), "subject"),
        ] {
            let err = h
                .bridge
                .process(msg, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, BridgeError::Validation(f) if f == field));
        }
        assert!(h.tracker.created.lock().unwrap().is_empty());
        assert_eq!(h.reporter.failures().len(), 3);
    }

    #[tokio::test]
    async fn handle_normalizes_raw_payload() {
        let h = harness(Some("@example.com"), None);
        let raw = RawEmail {
            from: Some("Jane <jane@example.com>".to_string()),
            to: Some("Bugs <bugs@example.com>".to_string()),
            subject: Some("app | crash".to_string()),
            html: Some("<body>boom</body>".to_string()),
            ..RawEmail::default()
        };
        let outcome = h.bridge.handle(&raw, &CancellationToken::new()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Created {
                project: "app".to_string(),
                title: "crash".to_string(),
            }
        );
        let records = h.audit.records();
        assert_eq!(records[0].1.sender, "jane@example.com");
        assert_eq!(records[0].1.content, "boom");
    }
}
