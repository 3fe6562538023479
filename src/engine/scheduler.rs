//! Periodic reminder scan.
//!
//! Every tick looks at today's shifts and reminds the workers of any shift
//! starting 60 to 75 minutes from now. Shift dates and times are display
//! strings in the store (`dd/mm/yyyy`, `HH:mm`); they are combined into an
//! instant here, in the configured timezone, and nowhere else.
//!
//! A shift whose start is never inside the window on any tick (a missed or
//! late tick) is not reminded later.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use opentelemetry::KeyValue;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, warn};

use crate::detect::reminder_event;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::model::delivery::DeliveryReport;
use crate::model::record::{Collection, Shift};
use crate::store::{DocumentStore, Filter, StoredDocument};
use crate::telemetry::dispatch::start_scan_span;
use crate::telemetry::metrics;
use crate::tracker::ReminderTracker;

const DATE_FORMAT: &str = "%d/%m/%Y";
const TIME_FORMAT: &str = "%H:%M";

/// Configuration for the reminder scan.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// How far ahead the window opens.
    pub lead: chrono::Duration,
    /// Width of the window; matches the scan cadence.
    pub width: chrono::Duration,
    /// Time between scans when running as a loop.
    pub interval: std::time::Duration,
    /// Zone the store's date and time strings are written in.
    pub timezone: Tz,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lead: chrono::Duration::minutes(60),
            width: chrono::Duration::minutes(15),
            interval: std::time::Duration::from_secs(15 * 60),
            timezone: chrono_tz::Asia::Jerusalem,
        }
    }
}

/// Closed interval of start times that are due for a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReminderWindow {
    pub fn at(now: DateTime<Utc>, config: &ReminderConfig) -> Self {
        let start = now + config.lead;
        Self {
            start,
            end: start + config.width,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Today's date in the store's format.
pub fn date_key(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format(DATE_FORMAT).to_string()
}

/// Start instant of a shift, or `None` if its date or time is missing or
/// malformed, or names a local time that does not exist.
pub fn shift_start(shift: &Shift, tz: Tz) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(shift.date.as_deref()?.trim(), DATE_FORMAT).ok()?;
    let time = NaiveTime::parse_from_str(shift.start_time.as_deref()?.trim(), TIME_FORMAT).ok()?;
    tz.from_local_datetime(&NaiveDateTime::new(date, time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// A reminder that went out (or was attempted) during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct Reminded {
    pub record_id: String,
    pub delivery: DeliveryReport,
    /// Error from committing the marker, if it failed.
    pub mark_error: Option<String>,
}

/// What one scan pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub date: String,
    pub candidates: usize,
    pub already_sent: usize,
    pub unparseable: usize,
    pub outside_window: usize,
    pub reminded: Vec<Reminded>,
}

impl ScanReport {
    /// Records whose marker commit failed.
    pub fn mark_failures(&self) -> impl Iterator<Item = &Reminded> {
        self.reminded.iter().filter(|r| r.mark_error.is_some())
    }
}

/// Runs reminder scans, once on demand or on a fixed cadence.
pub struct ReminderScheduler {
    store: Arc<dyn DocumentStore>,
    dispatcher: Arc<Dispatcher>,
    tracker: Arc<ReminderTracker>,
    config: ReminderConfig,
    shutdown: Arc<Notify>,
}

impl Clone for ReminderScheduler {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            dispatcher: Arc::clone(&self.dispatcher),
            tracker: Arc::clone(&self.tracker),
            config: self.config.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dispatcher: Arc<Dispatcher>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            tracker: Arc::new(ReminderTracker::new(Arc::clone(&store))),
            store,
            dispatcher,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Signal the loop to stop after the current pass.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Scan on every tick until shutdown. The first scan runs immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the interval is zero.
    pub async fn run(&self) -> Result<()> {
        if self.config.interval.is_zero() {
            return Err(Error::Config("reminder scan interval must be non-zero".to_string()));
        }
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.interval.as_secs(),
            timezone = %self.config.timezone,
            "reminder scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("reminder scheduler shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.scan(Utc::now()).await {
                        error!("reminder scan error: {e}");
                    }
                }
            }
        }
    }

    /// One pass over today's shifts.
    ///
    /// Fails only if the candidate query fails. Per-shift problems are
    /// counted in the report and never stop the pass.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let span = start_scan_span(now);
        async {
            let date = date_key(now, self.config.timezone);
            let window = ReminderWindow::at(now, &self.config);
            let candidates = self
                .store
                .query(Collection::Shifts.name(), &[Filter::eq("date", date.as_str())])
                .await?;

            let mut report = ScanReport {
                date,
                candidates: candidates.len(),
                ..ScanReport::default()
            };

            for candidate in candidates {
                self.consider(candidate, now, &window, &mut report).await;
            }

            info!(
                date = %report.date,
                candidates = report.candidates,
                reminded = report.reminded.len(),
                already_sent = report.already_sent,
                unparseable = report.unparseable,
                "reminder scan finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn consider(
        &self,
        candidate: StoredDocument,
        now: DateTime<Utc>,
        window: &ReminderWindow,
        report: &mut ScanReport,
    ) {
        let record_id = candidate.id;
        let shift: Shift = match serde_json::from_value(serde_json::Value::Object(candidate.data)) {
            Ok(shift) => shift,
            Err(e) => {
                debug!(record_id = %record_id, error = %e, "undecodable shift, skipping");
                report.unparseable += 1;
                return;
            }
        };

        if self.tracker.is_marked(&shift) {
            report.already_sent += 1;
            return;
        }

        let Some(start) = shift_start(&shift, self.config.timezone) else {
            debug!(record_id = %record_id, "shift start does not parse, skipping");
            report.unparseable += 1;
            return;
        };

        if !window.contains(start) {
            report.outside_window += 1;
            return;
        }

        let event = reminder_event(&record_id, &shift);
        metrics::events_detected().add(1, &[KeyValue::new("type", event.kind.type_name())]);
        let delivery = self.dispatcher.dispatch(&event).await;

        // Marked whatever the delivery outcome: at most one scheduling per shift.
        let mark_error = match self.tracker.mark_sent(&record_id, now).await {
            Ok(()) => None,
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "failed to mark reminder as sent");
                Some(e.to_string())
            }
        };

        report.reminded.push(Reminded {
            record_id,
            delivery,
            mark_error,
        });
    }
}
