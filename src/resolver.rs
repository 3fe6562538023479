//! Recipient resolution: user id to device endpoints and display name.
//!
//! A missing user document is not an error; it resolves to no endpoints and
//! the default name. Blank ids short-circuit without touching the store.

use std::sync::Arc;

use crate::error::Result;
use crate::model::record::{USERS, UserProfile, non_empty};
use crate::store::DocumentStore;

/// Name used when a user cannot be found or has none on record.
pub const UNKNOWN_NAME: &str = "Unknown";

pub struct RecipientResolver {
    store: Arc<dyn DocumentStore>,
}

impl RecipientResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Delivery endpoints registered for `user_id`.
    pub async fn resolve_endpoints(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .profile(user_id)
            .await?
            .map(|p| p.fcm_tokens.into_iter().filter(|t| !t.is_empty()).collect())
            .unwrap_or_default())
    }

    /// Display name of `user_id`, or [`UNKNOWN_NAME`].
    pub async fn resolve_name(&self, user_id: &str) -> Result<String> {
        Ok(self
            .lookup_name(user_id)
            .await?
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()))
    }

    /// Display name of `user_id` if the user exists and has one.
    pub async fn lookup_name(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.profile(user_id).await?.and_then(|p| {
            non_empty(p.full_name.as_deref()).map(str::to_string)
        }))
    }

    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        if user_id.is_empty() {
            return Ok(None);
        }
        let Some(document) = self.store.get(USERS, user_id).await? else {
            return Ok(None);
        };
        let profile = serde_json::from_value(serde_json::Value::Object(document))?;
        Ok(Some(profile))
    }
}
