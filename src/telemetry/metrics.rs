//! Metric instrument factories for roster-notify.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"roster-notify"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for roster-notify instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("roster-notify")
}

/// Counter: events produced by change detection and the reminder scan.
/// Labels: `type`.
pub fn events_detected() -> Counter<u64> {
    meter()
        .u64_counter("roster_notify.events.detected")
        .with_description("Number of notification events detected")
        .build()
}

/// Counter: per-endpoint delivery results.
/// Labels: `type`, `result` ("ok" | "failed").
pub fn deliveries() -> Counter<u64> {
    meter()
        .u64_counter("roster_notify.deliveries")
        .with_description("Number of per-endpoint delivery results")
        .build()
}

/// Counter: dispatches that did not produce a successful multicast call.
/// Labels: `reason` ("no_endpoints" | "transport_error" | "timeout").
pub fn dispatch_skipped() -> Counter<u64> {
    meter()
        .u64_counter("roster_notify.dispatch.skipped")
        .with_description("Dispatches with no multicast or a failed multicast")
        .build()
}

/// Counter: reminder marker commits.
/// Labels: `result` ("ok" | "error").
pub fn reminders_marked() -> Counter<u64> {
    meter()
        .u64_counter("roster_notify.reminders.marked")
        .with_description("Number of reminder marker writes")
        .build()
}

/// Histogram: dispatch duration in milliseconds (resolution + send).
/// Labels: `type`.
pub fn dispatch_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("roster_notify.dispatch.duration_ms")
        .with_description("Dispatch duration in milliseconds")
        .with_unit("ms")
        .build()
}
