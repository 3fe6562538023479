//! The engine's entry point for external triggers.
//!
//! Each trigger is an independent unit of work: decode the snapshots, detect
//! events, dispatch each event on its own. One event's delivery failure
//! never affects its siblings. The engine holds no state between
//! invocations; everything durable lives in the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::scheduler::{ReminderConfig, ReminderScheduler, ScanReport};
use crate::config::Config;
use crate::detect::{detect, detect_created};
use crate::dispatch::{DEFAULT_SEND_TIMEOUT, Dispatcher};
use crate::error::Result;
use crate::model::delivery::DeliveryReport;
use crate::model::event::Event;
use crate::model::record::{Collection, Snapshot};
use crate::resolver::RecipientResolver;
use crate::store::{Document, DocumentStore};
use crate::telemetry::metrics;
use crate::transport::PushTransport;

/// Something that happened outside the engine.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// A record changed from `before` to `after`.
    Updated {
        collection: Collection,
        record_id: String,
        before: Option<Document>,
        after: Option<Document>,
    },
    /// A record was written for the first time.
    Created {
        collection: Collection,
        record_id: String,
        after: Option<Document>,
    },
    /// A scheduler tick.
    Tick { at: DateTime<Utc> },
}

/// What one trigger invocation did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvocationReport {
    pub events: usize,
    pub deliveries: Vec<DeliveryReport>,
    pub scan: Option<ScanReport>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub send_timeout: Duration,
    pub reminder: ReminderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            reminder: ReminderConfig::default(),
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            send_timeout: config.send_timeout,
            reminder: ReminderConfig {
                interval: config.scan_interval,
                timezone: config.timezone,
                ..ReminderConfig::default()
            },
        }
    }
}

pub struct NotificationEngine {
    dispatcher: Arc<Dispatcher>,
    scheduler: ReminderScheduler,
}

impl NotificationEngine {
    /// Wire the engine to its store and transport.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn PushTransport>,
        config: EngineConfig,
    ) -> Self {
        let resolver = Arc::new(RecipientResolver::new(Arc::clone(&store)));
        let dispatcher = Arc::new(
            Dispatcher::new(resolver, transport).with_send_timeout(config.send_timeout),
        );
        let scheduler = ReminderScheduler::new(store, Arc::clone(&dispatcher), config.reminder);
        Self {
            dispatcher,
            scheduler,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Handle any trigger. Only a tick can fail, and only when the
    /// candidate query itself fails.
    pub async fn handle(&self, trigger: Trigger) -> Result<InvocationReport> {
        match trigger {
            Trigger::Updated {
                collection,
                record_id,
                before,
                after,
            } => Ok(self
                .on_updated(collection, &record_id, before.as_ref(), after.as_ref())
                .await),
            Trigger::Created {
                collection,
                record_id,
                after,
            } => Ok(self.on_created(collection, &record_id, after.as_ref()).await),
            Trigger::Tick { at } => {
                let scan = self.scheduler.scan(at).await?;
                Ok(InvocationReport {
                    events: scan.reminded.len(),
                    deliveries: scan.reminded.iter().map(|r| r.delivery.clone()).collect(),
                    scan: Some(scan),
                })
            }
        }
    }

    /// A record changed.
    pub async fn on_updated(
        &self,
        collection: Collection,
        record_id: &str,
        before: Option<&Document>,
        after: Option<&Document>,
    ) -> InvocationReport {
        let before = decode(collection, record_id, "before", before);
        let after = decode(collection, record_id, "after", after);
        let events = detect(record_id, before.as_ref(), after.as_ref());
        self.dispatch_all(events).await
    }

    /// A record was created.
    pub async fn on_created(
        &self,
        collection: Collection,
        record_id: &str,
        after: Option<&Document>,
    ) -> InvocationReport {
        let after = decode(collection, record_id, "after", after);
        let events = detect_created(record_id, after.as_ref());
        self.dispatch_all(events).await
    }

    /// Dispatch events independently and concurrently.
    pub async fn dispatch_all(&self, events: Vec<Event>) -> InvocationReport {
        if events.is_empty() {
            debug!("no events detected");
            return InvocationReport::default();
        }

        for event in &events {
            metrics::events_detected().add(1, &[KeyValue::new("type", event.kind.type_name())]);
        }
        info!(count = events.len(), "dispatching events");

        let deliveries = join_all(events.iter().map(|event| self.dispatcher.dispatch(event))).await;
        InvocationReport {
            events: events.len(),
            deliveries,
            scan: None,
        }
    }
}

/// Absent and undecodable documents both become `None`.
fn decode(
    collection: Collection,
    record_id: &str,
    which: &str,
    document: Option<&Document>,
) -> Option<Snapshot> {
    let document = document?;
    match Snapshot::decode(collection, document) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(%collection, record_id, which, error = %e, "malformed snapshot, ignoring");
            None
        }
    }
}
