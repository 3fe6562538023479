//! Per-dispatch delivery outcomes.

use serde::Serialize;

/// Error codes the push service reports only for tokens that will never work
/// again (app uninstalled, token rotated, malformed token). The generic
/// `INVALID_ARGUMENT` status is absent: a bad payload produces it too.
const STALE_CAUSES: &[&str] = &[
    "UNREGISTERED",
    "registration-token-not-registered",
    "invalid-registration-token",
];

/// How one recipient's endpoints resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Endpoints { count: usize },
    NoEndpoints,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientOutcome {
    pub user_id: String,
    pub resolution: Resolution,
}

/// Whether the multicast send happened and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    /// The transport answered; see the counts for per-endpoint results.
    Sent,
    /// No recipient had an endpoint, nothing was sent.
    NoEndpoints,
    /// The transport call itself failed.
    TransportError { error: String },
    /// The transport did not answer within the send timeout.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub cause: String,
}

impl EndpointFailure {
    /// Does the cause indicate the endpoint is permanently invalid?
    pub fn is_stale(&self) -> bool {
        // Causes read `CODE` or `CODE: message`; SDK codes may carry a
        // `messaging/` prefix.
        let code = self.cause.split(':').next().unwrap_or_default().trim();
        let code = code.strip_prefix("messaging/").unwrap_or(code);
        STALE_CAUSES.contains(&code)
    }
}

/// Aggregated result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub event_type: &'static str,
    pub record_id: String,
    pub recipients: Vec<RecipientOutcome>,
    /// Endpoints handed to the transport.
    pub endpoints: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<EndpointFailure>,
    pub status: DispatchStatus,
}

impl DeliveryReport {
    /// Endpoints whose failure marks them as no longer valid. These are
    /// reported only; nothing removes them from the user documents.
    pub fn stale_endpoints(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter(|f| f.is_stale())
            .map(|f| f.endpoint.as_str())
            .collect()
    }

    /// Did a multicast call go out?
    pub fn attempted(&self) -> bool {
        self.status != DispatchStatus::NoEndpoints
    }
}
