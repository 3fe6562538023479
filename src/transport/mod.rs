//! Push transport contract.
//!
//! A transport delivers one notification to many device tokens and reports
//! a result per token, in token order.

mod fcm;

pub use fcm::{FcmConfig, FcmTransport};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// One notification addressed to many tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

/// Outcome for a single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    pub success: bool,
    pub cause: Option<String>,
}

impl SendResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            cause: None,
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            success: false,
            cause: Some(cause.into()),
        }
    }
}

/// Per-token outcomes, aligned with [`MulticastMessage::tokens`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MulticastResponse {
    pub responses: Vec<SendResponse>,
}

impl MulticastResponse {
    pub fn success_count(&self) -> usize {
        self.responses.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.responses.len() - self.success_count()
    }
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Send `message` to every token. An empty token list is a no-op.
    ///
    /// Per-token rejections are reported in the response; `Err` means the
    /// call as a whole failed.
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<MulticastResponse>;
}
