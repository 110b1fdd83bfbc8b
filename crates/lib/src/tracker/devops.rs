//! REST work item client: creates a Bug through the tracker's JSON-patch API.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::DevOpsEndpoint;
use crate::error::BridgeError;
use crate::ticket::Ticket;
use crate::tracker::TicketTracker;

const API_VERSION: &str = "5.0";
const JSON_PATCH: &str = "application/json-patch+json";
const TITLE_FIELD: &str = "/fields/System.Title";
const REPRO_STEPS_FIELD: &str = "/fields/Microsoft.VSTS.TCM.ReproSteps";

/// One JSON-patch operation.
#[derive(Debug, Serialize)]
struct PatchOp<'a> {
    op: &'static str,
    path: &'static str,
    value: &'a str,
}

/// JSON-patch body setting title and repro steps.
pub fn work_item_patch(ticket: &Ticket) -> Result<String, serde_json::Error> {
    serde_json::to_string(&[
        PatchOp {
            op: "add",
            path: TITLE_FIELD,
            value: &ticket.title,
        },
        PatchOp {
            op: "add",
            path: REPRO_STEPS_FIELD,
            value: &ticket.content,
        },
    ])
}

/// `Basic base64(":" + token)`: empty user name, token as password.
pub fn basic_auth_header(personal_access_token: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(format!(":{}", personal_access_token));
    format!("Basic {}", encoded)
}

/// Client for the work item REST API.
#[derive(Clone)]
pub struct DevOpsTracker {
    base_url: String,
    organization: String,
    auth_header: String,
    client: reqwest::Client,
}

impl DevOpsTracker {
    pub fn new(endpoint: &DevOpsEndpoint) -> Result<Self, BridgeError> {
        let base_url = format!("{}://{}", endpoint.scheme, endpoint.host);
        Self::with_base_url(
            base_url,
            &endpoint.organization,
            &endpoint.personal_access_token,
            endpoint.timeout,
        )
    }

    /// Client against an explicit base URL (e.g. a local mock server).
    pub fn with_base_url(
        base_url: impl Into<String>,
        organization: &str,
        personal_access_token: &str,
        timeout: Duration,
    ) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            organization: organization.to_string(),
            auth_header: basic_auth_header(personal_access_token),
            client,
        })
    }

    /// POST target for a new Bug in `project`.
    pub fn work_item_url(&self, project: &str) -> String {
        format!(
            "{}/{}/{}/_apis/wit/workitems/$Bug?api-version={}",
            self.base_url, self.organization, project, API_VERSION
        )
    }
}

fn request_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::Cancelled
    } else {
        BridgeError::Request(e)
    }
}

#[async_trait]
impl TicketTracker for DevOpsTracker {
    async fn create(
        &self,
        ticket: &Ticket,
        project: &str,
        cancel: &CancellationToken,
    ) -> Result<(), BridgeError> {
        let url = self.work_item_url(project);
        let body = work_item_patch(ticket).map_err(|e| BridgeError::Payload(e.to_string()))?;
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, JSON_PATCH)
            .header(AUTHORIZATION, &self.auth_header)
            .body(body);
        let res = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
            res = request.send() => res.map_err(request_error)?,
        };
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(BridgeError::SubmissionFailed { status, body });
        }
        log::debug!("work item created in project '{}'", project);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tracker(server: &MockServer) -> DevOpsTracker {
        DevOpsTracker::with_base_url(server.uri(), "org", "secret", Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn auth_header_has_empty_user() {
        // base64(":secret")
        assert_eq!(basic_auth_header("secret"), "Basic OnNlY3JldA==");
    }

    #[test]
    fn url_contains_org_project_and_version() {
        let t = DevOpsTracker::with_base_url(
            "https://dev.azure.com/",
            "org",
            "pat",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            t.work_item_url("proj"),
            "https://dev.azure.com/org/proj/_apis/wit/workitems/$Bug?api-version=5.0"
        );
    }

    #[test]
    fn patch_body_shape() {
        let ticket = Ticket::new("crash", "steps");
        let body: serde_json::Value =
            serde_json::from_str(&work_item_patch(&ticket).unwrap()).unwrap();
        assert_eq!(
            body,
            json!([
                {"op": "add", "path": "/fields/System.Title", "value": "crash"},
                {"op": "add", "path": "/fields/Microsoft.VSTS.TCM.ReproSteps", "value": "steps"}
            ])
        );
    }

    #[tokio::test]
    async fn creates_work_item() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/org/proj/_apis/wit/workitems/$Bug"))
            .and(query_param("api-version", "5.0"))
            .and(header("authorization", "Basic OnNlY3JldA=="))
            .and(header("content-type", "application/json-patch+json"))
            .and(body_json(json!([
                {"op": "add", "path": "/fields/System.Title", "value": "crash"},
                {"op": "add", "path": "/fields/Microsoft.VSTS.TCM.ReproSteps", "value": "steps"}
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        tracker(&server)
            .create(&Ticket::new("crash", "steps"), "proj", &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_submission_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such project"))
            .mount(&server)
            .await;

        let err = tracker(&server)
            .create(&Ticket::new("t", "c"), "missing", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            BridgeError::SubmissionFailed { status, body } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert_eq!(body, "no such project");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelled_token_aborts_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = tracker(&server)
            .create(&Ticket::new("t", "c"), "proj", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled));
    }

    #[tokio::test]
    async fn slow_tracker_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let t = DevOpsTracker::with_base_url(server.uri(), "org", "pat", Duration::from_millis(200))
            .unwrap();
        let err = t
            .create(&Ticket::new("t", "c"), "proj", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled));
    }
}
