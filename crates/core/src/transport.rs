//! JSON-over-HTTP Transport
//!
//! Every remote call the exercise makes goes through the `Transport` trait so
//! that call sites can convert failures into their own fallbacks and tests can
//! substitute a scripted backend.

use crate::config::ExerciseConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Failure to obtain a usable response from the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP client could not be built: {0}")]
    Client(String),
    #[error("Request to {path} failed: {message}")]
    Request { path: String, message: String },
    #[error("Response from {path} was not valid JSON: {message}")]
    Decode { path: String, message: String },
}

/// Defines the contract for reaching the exercise backend.
///
/// Responses are returned as raw JSON regardless of HTTP status, because the
/// backend reports configuration problems in the body of 200/4xx responses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a `GET` and decodes the JSON body.
    async fn get_json(&self, path: &str) -> Result<Value, TransportError>;

    /// Issues a `POST` with a JSON body and decodes the JSON response.
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError>;

    /// Issues a form-encoded `POST`; the response body is ignored.
    async fn post_form(
        &self,
        path: &str,
        fields: Vec<(String, String)>,
    ) -> Result<(), TransportError>;
}

/// `Transport` implementation backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ExerciseConfig) -> Result<Self, TransportError> {
        Self::new(config.base_url.clone(), config.http_timeout)
    }

    /// The underlying client, shared with the cloud speech backend.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn decode(path: &str, response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        let value = response.json::<Value>().await.map_err(|e| TransportError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        debug!(%path, %status, "Backend responded");
        Ok(value)
    }
}

fn request_error(path: &str, e: reqwest::Error) -> TransportError {
    TransportError::Request {
        path: path.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| request_error(path, e))?;
        Self::decode(path, response).await
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(path, e))?;
        Self::decode(path, response).await
    }

    async fn post_form(
        &self,
        path: &str,
        fields: Vec<(String, String)>,
    ) -> Result<(), TransportError> {
        self.client
            .post(self.url(path))
            .form(&fields)
            .send()
            .await
            .map_err(|e| request_error(path, e))?;
        Ok(())
    }
}
