//! Notification fan-out.
//!
//! One event becomes one multicast: every target's endpoints are resolved
//! first, then a single send goes out carrying one notification. Nothing in
//! here returns an error; every failure mode ends up in the
//! [`DeliveryReport`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use opentelemetry::KeyValue;
use tracing::{Instrument, debug, error, info, warn};

use crate::model::delivery::{
    DeliveryReport, DispatchStatus, EndpointFailure, RecipientOutcome, Resolution,
};
use crate::model::event::{Author, Event};
use crate::model::notification::Notification;
use crate::model::record::non_empty;
use crate::resolver::RecipientResolver;
use crate::telemetry::dispatch::{record_endpoints, start_dispatch_span};
use crate::telemetry::metrics;
use crate::transport::{MulticastMessage, PushTransport};

/// Default bound on a single multicast send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Dispatcher {
    resolver: Arc<RecipientResolver>,
    transport: Arc<dyn PushTransport>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(resolver: Arc<RecipientResolver>, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            resolver,
            transport,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn resolver(&self) -> &RecipientResolver {
        &self.resolver
    }

    /// Resolve, render, and send `event`.
    pub async fn dispatch(&self, event: &Event) -> DeliveryReport {
        let event_type = event.kind.type_name();
        let span = start_dispatch_span(event_type, &event.record_id);
        let start = Instant::now();

        let report = self.dispatch_inner(event).instrument(span.clone()).await;

        metrics::dispatch_duration_ms().record(
            start.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("type", event_type)],
        );
        report
    }

    async fn dispatch_inner(&self, event: &Event) -> DeliveryReport {
        let (recipients, endpoints) = self.resolve_recipients(event).await;
        record_endpoints(&tracing::Span::current(), endpoints.len());

        let mut report = DeliveryReport {
            event_type: event.kind.type_name(),
            record_id: event.record_id.clone(),
            recipients,
            endpoints: endpoints.len(),
            success_count: 0,
            failure_count: 0,
            failures: Vec::new(),
            status: DispatchStatus::NoEndpoints,
        };

        if endpoints.is_empty() {
            debug!("no endpoints for any recipient, nothing to send");
            metrics::dispatch_skipped().add(1, &[KeyValue::new("reason", "no_endpoints")]);
            return report;
        }

        let author_name = match event.kind.author() {
            Some(author) => self.author_name(author).await,
            None => None,
        };
        let notification = Notification::for_event(event, author_name.as_deref());
        let message = MulticastMessage {
            tokens: endpoints,
            title: notification.title,
            body: notification.body,
            data: notification.data,
        };

        let outcome = tokio::time::timeout(
            self.send_timeout,
            self.transport.send_multicast(&message),
        )
        .await;

        match outcome {
            Ok(Ok(response)) => {
                report.status = DispatchStatus::Sent;
                for (i, token) in message.tokens.iter().enumerate() {
                    match response.responses.get(i) {
                        Some(r) if r.success => report.success_count += 1,
                        Some(r) => report.failures.push(EndpointFailure {
                            endpoint: token.clone(),
                            cause: r.cause.clone().unwrap_or_else(|| "unknown".to_string()),
                        }),
                        None => report.failures.push(EndpointFailure {
                            endpoint: token.clone(),
                            cause: "no response from transport".to_string(),
                        }),
                    }
                }
                report.failure_count = report.failures.len();
                info!(
                    transport = self.transport.name(),
                    success = report.success_count,
                    failed = report.failure_count,
                    "multicast sent"
                );
            }
            Ok(Err(e)) => {
                error!(transport = self.transport.name(), error = %e, "multicast failed");
                metrics::dispatch_skipped().add(1, &[KeyValue::new("reason", "transport_error")]);
                report.status = DispatchStatus::TransportError {
                    error: e.to_string(),
                };
                fail_all(&mut report, &message.tokens, &e.to_string());
            }
            Err(_) => {
                error!(
                    transport = self.transport.name(),
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "multicast timed out"
                );
                metrics::dispatch_skipped().add(1, &[KeyValue::new("reason", "timeout")]);
                report.status = DispatchStatus::TimedOut;
                fail_all(&mut report, &message.tokens, "timeout");
            }
        }

        for failure in &report.failures {
            warn!(endpoint = %failure.endpoint, cause = %failure.cause, "delivery failed");
        }
        let stale = report.stale_endpoints();
        if !stale.is_empty() {
            // Reported only; the user documents keep these tokens.
            warn!(count = stale.len(), "stale endpoints detected");
        }

        let event_type = KeyValue::new("type", report.event_type);
        metrics::deliveries().add(
            report.success_count as u64,
            &[event_type.clone(), KeyValue::new("result", "ok")],
        );
        metrics::deliveries().add(
            report.failure_count as u64,
            &[event_type, KeyValue::new("result", "failed")],
        );

        report
    }

    /// Resolve every target concurrently. Returns one outcome per target and
    /// the combined endpoint list, deduplicated in first-seen order.
    async fn resolve_recipients(&self, event: &Event) -> (Vec<RecipientOutcome>, Vec<String>) {
        let targets: Vec<&str> = event.targets().collect();
        let lookups = targets
            .iter()
            .map(|user_id| self.resolver.resolve_endpoints(user_id));
        let results = join_all(lookups).await;

        let mut outcomes = Vec::with_capacity(targets.len());
        let mut seen = BTreeSet::new();
        let mut endpoints = Vec::new();

        for (user_id, result) in targets.into_iter().zip(results) {
            let resolution = match result {
                Ok(tokens) if tokens.is_empty() => Resolution::NoEndpoints,
                Ok(tokens) => {
                    let count = tokens.len();
                    for token in tokens {
                        if seen.insert(token.clone()) {
                            endpoints.push(token);
                        }
                    }
                    Resolution::Endpoints { count }
                }
                Err(e) => {
                    warn!(user_id, error = %e, "endpoint lookup failed, skipping recipient");
                    Resolution::Failed {
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(RecipientOutcome {
                user_id: user_id.to_string(),
                resolution,
            });
        }

        (outcomes, endpoints)
    }

    /// Embedded name, else the author's profile name, else `None`.
    async fn author_name(&self, author: Author<'_>) -> Option<String> {
        if let Some(name) = non_empty(author.name) {
            return Some(name.to_string());
        }
        let id = non_empty(author.id)?;
        match self.resolver.lookup_name(id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(user_id = id, error = %e, "author name lookup failed");
                None
            }
        }
    }
}

fn fail_all(report: &mut DeliveryReport, tokens: &[String], cause: &str) {
    report.failures = tokens
        .iter()
        .map(|token| EndpointFailure {
            endpoint: token.clone(),
            cause: cause.to_string(),
        })
        .collect();
    report.success_count = 0;
    report.failure_count = report.failures.len();
}
