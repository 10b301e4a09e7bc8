//! Best-effort session bookkeeping calls.
//!
//! Starting and submitting a run are advisory: the exercise is complete for
//! the user whether or not the backend records it. Both calls return a
//! `Result` and the caller decides to discard it.

use crate::transport::{Transport, TransportError};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

/// Summary text sent with every completed run.
pub const COMPLETION_SUMMARY: &str = "client finished";

/// Body of the final submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub summary: String,
    pub client_name: String,
    pub preview: bool,
}

impl Submission {
    pub fn completed(client_name: impl Into<String>, preview: bool) -> Self {
        Self {
            summary: COMPLETION_SUMMARY.to_string(),
            client_name: client_name.into(),
            preview,
        }
    }
}

/// Client for the per-session `start` and `submit` endpoints.
#[derive(Clone)]
pub struct SessionApi {
    transport: Arc<dyn Transport>,
    token: Option<String>,
}

impl SessionApi {
    pub fn new(transport: Arc<dyn Transport>, token: Option<String>) -> Self {
        Self { transport, token }
    }

    /// Whether a session token is known; without one both calls are skipped.
    pub fn has_session(&self) -> bool {
        self.token.is_some()
    }

    /// Announces the start of a run. Returns `Ok(false)` when skipped.
    #[instrument(skip_all)]
    pub async fn start(&self, client_name: &str) -> Result<bool, TransportError> {
        let Some(token) = &self.token else {
            return Ok(false);
        };
        self.transport
            .post_form(
                &format!("/api/{token}/start"),
                vec![("client_name".to_string(), client_name.to_string())],
            )
            .await?;
        Ok(true)
    }

    /// Submits the completed run. Returns `Ok(false)` when skipped.
    #[instrument(skip_all, fields(preview = submission.preview))]
    pub async fn submit(&self, submission: &Submission) -> Result<bool, TransportError> {
        let Some(token) = &self.token else {
            return Ok(false);
        };
        let body = json!({
            "summary": submission.summary,
            "client_name": submission.client_name,
            "preview": submission.preview,
        });
        self.transport
            .post_json(&format!("/api/{token}/submit"), body)
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use mockall::predicate::eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_start_posts_client_name_form() {
        let mut transport = MockTransport::new();
        transport
            .expect_post_form()
            .withf(|path, fields| {
                path == "/api/tok/start"
                    && fields == &vec![("client_name".to_string(), "سارة".to_string())]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let api = SessionApi::new(Arc::new(transport), Some("tok".to_string()));
        assert_eq!(api.start("سارة").await, Ok(true));
    }

    #[tokio::test]
    async fn test_submit_posts_summary() {
        let mut transport = MockTransport::new();
        transport
            .expect_post_json()
            .with(
                eq("/api/tok/submit"),
                eq(json!({"summary": "client finished", "client_name": "سارة", "preview": true})),
            )
            .times(1)
            .returning(|_, _| Ok(json!({"ok": true, "skipped": "preview"})));

        let api = SessionApi::new(Arc::new(transport), Some("tok".to_string()));
        let submission = Submission::completed("سارة", true);
        assert_eq!(api.submit(&submission).await, Ok(true));
    }

    #[tokio::test]
    async fn test_calls_are_skipped_without_token() {
        let mut transport = MockTransport::new();
        transport.expect_post_form().times(0);
        transport.expect_post_json().times(0);

        let api = SessionApi::new(Arc::new(transport), None);
        assert!(!api.has_session());
        assert_eq!(api.start("x").await, Ok(false));
        assert_eq!(api.submit(&Submission::completed("x", false)).await, Ok(false));
    }

    #[tokio::test]
    async fn test_submit_failure_is_returned_to_caller() {
        let mut transport = MockTransport::new();
        transport.expect_post_json().returning(|path, _| {
            Err(TransportError::Request {
                path: path.to_string(),
                message: "offline".to_string(),
            })
        });

        let api = SessionApi::new(Arc::new(transport), Some("tok".to_string()));
        assert!(api.submit(&Submission::completed("x", false)).await.is_err());
    }
}
