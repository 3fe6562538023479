//! Shift and task snapshots, decoded from store documents.
//!
//! Field names follow the documents written by the mobile app (camelCase).
//! Decoding is lenient: missing or `null` lists are empty, rejection
//! entries accept every historical spelling of the worker id, and a single
//! malformed rejection, message or comment entry decodes as an empty entry
//! instead of failing the whole record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{entries, nullable, text};
use crate::error::{Error, Result};
use crate::store::Document;

/// Collection holding user profiles (endpoints and display names).
pub const USERS: &str = "users";

/// The record collections the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Shifts,
    Tasks,
}

impl Collection {
    /// Store collection name.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Shifts => "shifts",
            Collection::Tasks => "tasks",
        }
    }

    /// Data key the mobile client routes on.
    pub fn routing_key(self) -> &'static str {
        match self {
            Collection::Shifts => "shiftId",
            Collection::Tasks => "taskId",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shifts" => Ok(Collection::Shifts),
            "tasks" => Ok(Collection::Tasks),
            other => Err(Error::Other(format!("unknown collection: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Shift
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_workers: Vec<String>,

    #[serde(default, deserialize_with = "entries")]
    pub rejected_worker_data: Vec<Decision>,

    #[serde(default, deserialize_with = "entries")]
    pub messages: Vec<SubEntry>,

    /// Display date, `dd/mm/yyyy`.
    #[serde(default)]
    pub date: Option<String>,

    /// Local start time, `HH:mm`.
    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub department: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub reminder_sent: bool,
}

impl Shift {
    pub fn department_or_default(&self) -> String {
        non_empty(self.department.as_deref()).unwrap_or("Unknown").to_string()
    }

    pub fn date_or_default(&self) -> String {
        non_empty(self.date.as_deref())
            .unwrap_or("Unknown date")
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Vec<String>,

    #[serde(default, deserialize_with = "entries")]
    pub comments: Vec<SubEntry>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub created_by: Option<String>,
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A rejection entry, normalized to a single worker id.
///
/// The documents have carried the id as `userId`, `odekId` and `odek_id`
/// over time. The first non-empty one wins, in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawDecision")]
pub struct Decision {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
struct RawDecision {
    #[serde(default, rename = "userId", deserialize_with = "text")]
    user_id: Option<String>,
    #[serde(default, rename = "odekId", deserialize_with = "text")]
    odek_id: Option<String>,
    #[serde(default, rename = "odek_id", deserialize_with = "text")]
    odek_id_snake: Option<String>,
}

impl From<RawDecision> for Decision {
    fn from(raw: RawDecision) -> Self {
        let user_id = [raw.user_id, raw.odek_id, raw.odek_id_snake]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty());
        Self { user_id }
    }
}

/// An appended message (shifts) or comment (tasks).
///
/// Messages spell the author as `senderId`/`senderName`, comments as
/// `userId`/`userName`; both decode into the same shape, the `sender*`
/// spelling winning when an entry carries both. Non-string values read as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSubEntry")]
pub struct SubEntry {
    pub author_id: Option<String>,
    /// Display-name override embedded by the writer, if any.
    pub author_name: Option<String>,
    pub body: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubEntry {
    #[serde(default, deserialize_with = "text")]
    sender_id: Option<String>,
    #[serde(default, deserialize_with = "text")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "text")]
    sender_name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    user_name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    text: Option<String>,
}

impl From<RawSubEntry> for SubEntry {
    fn from(raw: RawSubEntry) -> Self {
        let first = |a: Option<String>, b: Option<String>| {
            [a, b].into_iter().flatten().find(|s| !s.is_empty())
        };
        Self {
            author_id: first(raw.sender_id, raw.user_id),
            author_name: first(raw.sender_name, raw.user_name),
            body: raw.text.unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One observation of a record's fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Shift(Shift),
    Task(Task),
}

impl Snapshot {
    /// Decode a store document as a snapshot of the given collection.
    pub fn decode(collection: Collection, document: &Document) -> Result<Self> {
        let value = serde_json::Value::Object(document.clone());
        Ok(match collection {
            Collection::Shifts => Snapshot::Shift(serde_json::from_value(value)?),
            Collection::Tasks => Snapshot::Task(serde_json::from_value(value)?),
        })
    }

    pub fn collection(&self) -> Collection {
        match self {
            Snapshot::Shift(_) => Collection::Shifts,
            Snapshot::Task(_) => Collection::Tasks,
        }
    }

    /// Current membership: assigned workers of a shift, assignees of a task.
    pub fn members(&self) -> &[String] {
        match self {
            Snapshot::Shift(shift) => &shift.assigned_workers,
            Snapshot::Task(task) => &task.assigned_to,
        }
    }
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

/// The slice of a user document the resolver reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "nullable")]
    pub fcm_tokens: Vec<String>,

    #[serde(default)]
    pub full_name: Option<String>,
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
