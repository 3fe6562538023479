//! Typed events derived from a record's snapshots.
//!
//! An event names what happened, which record it happened to, and who should
//! hear about it. Events carry raw payload fields; rendering into
//! user-facing text happens in [`super::notification`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::record::Collection;

/// A derived fact about one record, addressed to a set of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub record_id: String,
    /// Users the event concerns.
    pub recipients: BTreeSet<String>,
    /// Users never notified even if listed in `recipients` (e.g. the author
    /// of a message).
    pub excluded: BTreeSet<String>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ShiftAssigned {
        department: String,
        date: String,
    },
    ShiftRejected {
        department: String,
        date: String,
    },
    ShiftMessage {
        sender_id: Option<String>,
        sender_name: Option<String>,
        text: String,
    },
    TaskAssigned {
        title: String,
    },
    TaskComment {
        commenter_id: Option<String>,
        commenter_name: Option<String>,
        title: String,
        text: String,
    },
    ShiftReminder {
        department: String,
        date: String,
        start_time: String,
    },
}

/// Author fields of an append event, as embedded in the entry.
#[derive(Debug, Clone, Copy)]
pub struct Author<'a> {
    pub id: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl EventKind {
    /// The `type` value sent in the notification data payload.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::ShiftAssigned { .. } => "shift_assigned",
            EventKind::ShiftRejected { .. } => "shift_rejected",
            EventKind::ShiftMessage { .. } => "shift_message",
            EventKind::TaskAssigned { .. } => "task_assigned",
            EventKind::TaskComment { .. } => "task_comment",
            EventKind::ShiftReminder { .. } => "shift_reminder",
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            EventKind::TaskAssigned { .. } | EventKind::TaskComment { .. } => Collection::Tasks,
            _ => Collection::Shifts,
        }
    }

    /// Author of a message or comment; `None` for every other kind.
    pub fn author(&self) -> Option<Author<'_>> {
        match self {
            EventKind::ShiftMessage {
                sender_id,
                sender_name,
                ..
            } => Some(Author {
                id: sender_id.as_deref(),
                name: sender_name.as_deref(),
            }),
            EventKind::TaskComment {
                commenter_id,
                commenter_name,
                ..
            } => Some(Author {
                id: commenter_id.as_deref(),
                name: commenter_name.as_deref(),
            }),
            _ => None,
        }
    }
}

impl Event {
    pub fn new(record_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            record_id: record_id.into(),
            recipients: BTreeSet::new(),
            excluded: BTreeSet::new(),
            kind,
        }
    }

    pub fn recipient(mut self, user_id: impl Into<String>) -> Self {
        self.recipients.insert(user_id.into());
        self
    }

    pub fn recipients<I, S>(mut self, user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients.extend(user_ids.into_iter().map(Into::into));
        self
    }

    pub fn excluding(mut self, user_id: Option<&str>) -> Self {
        if let Some(id) = user_id {
            self.excluded.insert(id.to_string());
        }
        self
    }

    /// Recipients left after exclusions, skipping blank ids.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.recipients
            .iter()
            .filter(|id| !id.is_empty() && !self.excluded.contains(*id))
            .map(String::as_str)
    }

    /// Data payload for client-side routing.
    pub fn data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), self.kind.type_name().to_string());
        data.insert("recordId".to_string(), self.record_id.clone());
        data.insert(
            self.kind.collection().routing_key().to_string(),
            self.record_id.clone(),
        );
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_drop_excluded_and_blank_ids() {
        let event = Event::new(
            "t1",
            EventKind::TaskComment {
                commenter_id: Some("u1".into()),
                commenter_name: None,
                title: "Inventory".into(),
                text: "done".into(),
            },
        )
        .recipients(["u1", "u2", "", "u3"])
        .excluding(Some("u1"));

        let targets: Vec<_> = event.targets().collect();
        assert_eq!(targets, vec!["u2", "u3"]);
    }

    #[test]
    fn data_carries_type_and_routing_ids() {
        let event = Event::new(
            "s1",
            EventKind::ShiftAssigned {
                department: "Bar".into(),
                date: "01/02/2026".into(),
            },
        );
        let data = event.data();
        assert_eq!(data["type"], "shift_assigned");
        assert_eq!(data["recordId"], "s1");
        assert_eq!(data["shiftId"], "s1");
        assert!(!data.contains_key("taskId"));
    }
}
