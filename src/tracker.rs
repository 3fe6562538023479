//! Persisted "already sent" markers for reminders.
//!
//! A shift's `reminderSent` flag flips to `true` once, after its reminder
//! dispatch has been attempted, and is never cleared. The check reads the
//! snapshot taken at the start of the scan and the write is a plain field
//! update, so two overlapping scans can both send before either marks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use serde_json::Value;

use crate::error::Result;
use crate::model::record::{Collection, Shift};
use crate::store::{Document, DocumentStore};
use crate::telemetry::metrics;

pub const MARKER_FIELD: &str = "reminderSent";
pub const MARKED_AT_FIELD: &str = "reminderSentAt";

pub struct ReminderTracker {
    store: Arc<dyn DocumentStore>,
}

impl ReminderTracker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Has the reminder for this shift already gone out?
    pub fn is_marked(&self, shift: &Shift) -> bool {
        shift.reminder_sent
    }

    /// Persist the marker for `record_id`.
    pub async fn mark_sent(&self, record_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut fields = Document::new();
        fields.insert(MARKER_FIELD.to_string(), Value::Bool(true));
        fields.insert(MARKED_AT_FIELD.to_string(), Value::String(at.to_rfc3339()));

        let result = self
            .store
            .update(Collection::Shifts.name(), record_id, fields)
            .await;

        let label = if result.is_ok() { "ok" } else { "error" };
        metrics::reminders_marked().add(1, &[KeyValue::new("result", label)]);
        result
    }
}
