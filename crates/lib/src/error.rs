//! Error taxonomy shared by the bridge components.
//!
//! Filter rejections are not errors; they surface as [`crate::pipeline::Outcome::Rejected`].

/// Failure while turning one inbound email into a work item.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A required message field (from, to, subject) is missing or empty.
    #[error("missing required field: {0}")]
    Validation(&'static str),

    /// An address is neither "Display Name <addr>" nor a bare address.
    #[error("invalid address, expected 'some name <email>' but found: {0}")]
    MalformedAddress(String),

    /// The tracker answered with a non-2xx status.
    #[error("work item creation failed: {status} {body}")]
    SubmissionFailed {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The tracker could not be reached.
    #[error("work item request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The tracker call was cancelled or timed out.
    #[error("work item request cancelled")]
    Cancelled,

    /// Required configuration or secrets are missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Writing to a directory-backed store failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// The webhook body could not be decoded.
    #[error("invalid payload: {0}")]
    Payload(String),
}

impl BridgeError {
    /// True for errors raised by the tracker call (logged as critical at the boundary).
    pub fn is_submission_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::SubmissionFailed { .. } | BridgeError::Request(_) | BridgeError::Cancelled
        )
    }
}
