//! # roster-notify
//!
//! Push-notification engine for shift rosters and task lists.
//!
//! Diffs before/after snapshots of records held in a document store into
//! typed events (assignment, rejection, new message or comment, shift
//! reminder), resolves each event's recipients to device endpoints, and fans
//! every event out as a single multicast send.

pub mod config;
pub mod db;
pub mod detect;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod resolver;
pub mod store;
pub mod telemetry;
pub mod tracker;
pub mod transport;
