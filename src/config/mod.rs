//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use std::time::Duration;

use crate::error::{Error, Result};
use chrono_tz::Tz;
use secrecy::SecretString;

/// Default IANA zone used to interpret the store's `dd/mm/yyyy` + `HH:mm` strings.
pub const DEFAULT_TIMEZONE: &str = "Asia/Jerusalem";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub fcm_project_id: String,
    pub fcm_access_token: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Upper bound on a single multicast send.
    pub send_timeout: Duration,
    /// Reminder scan cadence.
    pub scan_interval: Duration,
    pub timezone: Tz,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            fcm_project_id: required_var("FCM_PROJECT_ID")?,
            fcm_access_token: SecretString::from(required_var("FCM_ACCESS_TOKEN")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            send_timeout: Duration::from_secs(positive_secs_var("SEND_TIMEOUT_SECS", 10)?),
            scan_interval: Duration::from_secs(positive_secs_var("SCAN_INTERVAL_SECS", 900)?),
            timezone: timezone_var("REMINDER_TIMEZONE")?,
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

/// Whole seconds, at least one.
fn positive_secs_var(name: &str, default: u64) -> Result<u64> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(Error::Config(format!("{name} must be at least 1 second"))),
        Ok(secs) => Ok(secs),
        Err(_) => Err(Error::Config(format!(
            "{name} must be a whole number of seconds, got {raw:?}"
        ))),
    }
}

fn timezone_var(name: &str) -> Result<Tz> {
    let raw = std::env::var(name).unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
    raw.parse()
        .map_err(|_| Error::Config(format!("{name}: '{raw}' is not a valid IANA timezone")))
}
