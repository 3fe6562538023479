//! Span helpers for dispatches and reminder scans.

use chrono::{DateTime, Utc};
use tracing::Span;

/// Start a span covering one event's dispatch.
///
/// `dispatch.endpoints` is declared empty and filled in with
/// [`record_endpoints`] once recipients are resolved.
pub fn start_dispatch_span(event_type: &str, record_id: &str) -> Span {
    tracing::info_span!(
        "notification.dispatch",
        "event.type" = event_type,
        "record.id" = record_id,
        "dispatch.endpoints" = tracing::field::Empty,
    )
}

/// Record how many endpoints the dispatch is sending to.
pub fn record_endpoints(span: &Span, endpoints: usize) {
    span.record("dispatch.endpoints", endpoints);
}

/// Start a span covering one reminder scan pass.
pub fn start_scan_span(now: DateTime<Utc>) -> Span {
    tracing::info_span!("reminder.scan", "scan.now" = %now.to_rfc3339())
}
