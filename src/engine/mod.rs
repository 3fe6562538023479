//! Trigger handling: mutation observations and scheduler ticks in,
//! dispatched notifications out.

pub mod scheduler;
pub mod triggers;

pub use scheduler::{ReminderConfig, ReminderScheduler, ScanReport};
pub use triggers::{EngineConfig, InvocationReport, NotificationEngine, Trigger};
