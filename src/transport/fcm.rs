//! Firebase Cloud Messaging (HTTP v1) transport.
//!
//! FCM v1 takes one token per request, so a multicast is a bounded-concurrency
//! batch of single sends whose results are collected in token order.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{MulticastMessage, MulticastResponse, PushTransport, SendResponse};
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://fcm.googleapis.com";

/// Failure cause for a token whose request outlived the multicast deadline.
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

#[derive(Debug)]
pub struct FcmConfig {
    pub project_id: String,
    /// OAuth2 bearer token for the FCM API.
    pub access_token: SecretString,
    pub base_url: String,
    /// Maximum in-flight requests per multicast.
    pub concurrency: usize,
    /// Budget for a whole multicast. Tokens still unanswered when it runs
    /// out fail with [`DEADLINE_EXCEEDED`]; answers already in are kept.
    pub deadline: Duration,
}

impl FcmConfig {
    pub fn new(project_id: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            project_id: project_id.into(),
            access_token,
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: 16,
            deadline: Duration::from_secs(9),
        }
    }
}

pub struct FcmTransport {
    config: FcmConfig,
    client: Client,
}

/// `{"error": {...}}` body returned on a rejected send.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
}

impl FcmTransport {
    pub fn new(config: FcmConfig) -> Result<Self> {
        // The multicast deadline always fires first for a stalled request.
        let client = Client::builder()
            .timeout(config.deadline + Duration::from_secs(1))
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id
        )
    }

    /// Send to one token. `Err` only when the request never got an answer.
    async fn send_one(
        &self,
        url: &str,
        token: &str,
        message: &MulticastMessage,
    ) -> Result<SendResponse> {
        let payload = json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
            }
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(SendResponse::ok());
        }

        let body = response.text().await.unwrap_or_default();
        Ok(SendResponse::failed(failure_cause(status, &body)))
    }
}

/// Most specific cause available: FCM error code, then RPC status, then HTTP status.
fn failure_cause(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let code = parsed
                .error
                .details
                .iter()
                .find_map(|d| d.error_code.clone())
                .or(parsed.error.status);
            match (code, parsed.error.message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (Some(code), None) => code,
                (None, Some(message)) => format!("{status}: {message}"),
                (None, None) => status.to_string(),
            }
        }
        Err(_) => status.to_string(),
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    fn name(&self) -> &'static str {
        "fcm"
    }

    async fn send_multicast(&self, message: &MulticastMessage) -> Result<MulticastResponse> {
        if message.tokens.is_empty() {
            return Ok(MulticastResponse::default());
        }

        let url = self.endpoint();
        let url = &url;
        let deadline = Instant::now() + self.config.deadline;
        let results: Vec<Result<SendResponse>> = stream::iter(message.tokens.iter().cloned())
            .map(move |token| async move {
                let send = self.send_one(url, &token, message);
                tokio::time::timeout_at(deadline, send)
                    .await
                    .unwrap_or_else(|_| Ok(SendResponse::failed(DEADLINE_EXCEEDED)))
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        if results.iter().all(|r| r.is_err()) {
            let first = results
                .into_iter()
                .find_map(|r| r.err())
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(Error::Transport(format!("FCM unreachable: {first}")));
        }

        let responses = results
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|e| {
                    warn!(error = %e, "FCM request failed");
                    SendResponse::failed(e.to_string())
                })
            })
            .collect::<Vec<_>>();

        debug!(
            tokens = message.tokens.len(),
            failures = responses.iter().filter(|r| !r.success).count(),
            "FCM multicast finished"
        );
        Ok(MulticastResponse { responses })
    }
}
