//! Client for the remote document-build service used by report jobs.
//!
//! A build is started once and then polled until it finishes:
//!
//! - `POST {base}/builds` with a [`ReportRequest`] returns `{ "key": ... }`.
//! - `GET {base}/builds/{key}` returns `{ "status": "in_progress" | "done" |
//!   "failed", "percent"?, "url"?, "error"? }`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tenvault_core::types::TenantId;
use uuid::Uuid;

/// What to build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub tenant: TenantId,
    pub user: Uuid,
    /// Template name understood by the build service.
    pub template: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportState {
    InProgress(u8),
    /// The finished document's URL.
    Done(String),
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Report service error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Report build failed: {0}")]
    Failed(String),

    #[error("Report build did not finish after {polls} polls")]
    Timeout { polls: u32 },

    #[error("Report service is not configured")]
    NotConfigured,
}

impl ReportError {
    /// Network failures and server-side errors are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Failed(_) | Self::Timeout { .. } | Self::NotConfigured => false,
        }
    }
}

/// Remote builder seam; the HTTP client is the production implementation.
#[async_trait]
pub trait ReportBuilder: Send + Sync {
    /// Start a build and return its key.
    async fn start(&self, request: &ReportRequest) -> Result<String, ReportError>;

    async fn poll(&self, key: &str) -> Result<ReportState, ReportError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StartResponse {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BuildStatus {
    InProgress,
    Done,
    Failed,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: BuildStatus,
    #[serde(default)]
    percent: u8,
    url: Option<String>,
    error: Option<String>,
}

impl From<PollResponse> for ReportState {
    fn from(r: PollResponse) -> Self {
        match r.status {
            BuildStatus::InProgress => Self::InProgress(r.percent.min(100)),
            BuildStatus::Done => Self::Done(r.url.unwrap_or_default()),
            BuildStatus::Failed => {
                Self::Failed(r.error.unwrap_or_else(|| "unknown error".to_string()))
            }
        }
    }
}

/// HTTP client for the document-build service.
pub struct HttpReportBuilder {
    client: reqwest::Client,
    api_url: String,
}

impl HttpReportBuilder {
    /// * `api_url` - Base HTTP URL without a trailing slash.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ReportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ReportError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ReportError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ReportBuilder for HttpReportBuilder {
    async fn start(&self, request: &ReportRequest) -> Result<String, ReportError> {
        let response = self
            .client
            .post(format!("{}/builds", self.api_url))
            .json(request)
            .send()
            .await?;

        let started: StartResponse = Self::parse_response(response).await?;
        Ok(started.key)
    }

    async fn poll(&self, key: &str) -> Result<ReportState, ReportError> {
        let response = self
            .client
            .get(format!("{}/builds/{}", self.api_url, key))
            .send()
            .await?;

        let polled: PollResponse = Self::parse_response(response).await?;
        Ok(polled.into())
    }
}

/// Builder used when no report service is configured; every start fails.
pub struct UnconfiguredReportBuilder;

#[async_trait]
impl ReportBuilder for UnconfiguredReportBuilder {
    async fn start(&self, _request: &ReportRequest) -> Result<String, ReportError> {
        Err(ReportError::NotConfigured)
    }

    async fn poll(&self, _key: &str) -> Result<ReportState, ReportError> {
        Err(ReportError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_responses_map_to_states() {
        let parse = |json: &str| -> ReportState {
            serde_json::from_str::<PollResponse>(json).unwrap().into()
        };

        assert_eq!(
            parse(r#"{"status":"in_progress","percent":130}"#),
            ReportState::InProgress(100)
        );
        assert_eq!(
            parse(r#"{"status":"done","url":"https://docs/r.xlsx"}"#),
            ReportState::Done("https://docs/r.xlsx".into())
        );
        assert_eq!(
            parse(r#"{"status":"failed"}"#),
            ReportState::Failed("unknown error".into())
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let b = HttpReportBuilder::new("http://builder:9000/".into());
        assert_eq!(b.api_url, "http://builder:9000");
    }
}
