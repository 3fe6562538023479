//! Rendering events into the title/body/data triple sent to devices.

use std::collections::BTreeMap;

use serde::Serialize;

use super::event::{Event, EventKind};

/// Character cap on a shift message body.
pub const MESSAGE_BODY_LIMIT: usize = 100;
/// Character cap on a task comment body.
pub const COMMENT_BODY_LIMIT: usize = 80;

const ELLIPSIS: &str = "...";

const SENDER_PLACEHOLDER: &str = "מנהל";
const COMMENTER_PLACEHOLDER: &str = "משתמש";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl Notification {
    /// Build the notification for `event`.
    ///
    /// `author_name` is the resolved display name of a message or comment
    /// author; when `None` the kind's placeholder is used.
    pub fn for_event(event: &Event, author_name: Option<&str>) -> Self {
        let (title, body) = match &event.kind {
            EventKind::ShiftAssigned { department, date } => (
                "שובצת למשמרת! 🎉".to_string(),
                format!("שובצת למשמרת ב{department} בתאריך {date}"),
            ),
            EventKind::ShiftRejected { department, date } => (
                "עדכון משמרת".to_string(),
                format!("הבקשה שלך למשמרת ב{department} בתאריך {date} לא אושרה"),
            ),
            EventKind::ShiftMessage { text, .. } => {
                let sender = author_name.unwrap_or(SENDER_PLACEHOLDER);
                (
                    format!("הודעה חדשה מ{sender} 💬"),
                    truncate(text, MESSAGE_BODY_LIMIT),
                )
            }
            EventKind::TaskAssigned { title } => (
                "משימה חדשה! 📋".to_string(),
                format!("קיבלת משימה חדשה: {title}"),
            ),
            EventKind::TaskComment { title, text, .. } => {
                let commenter = author_name.unwrap_or(COMMENTER_PLACEHOLDER);
                (
                    format!("תגובה חדשה ב{title} 💬"),
                    format!("{commenter}: {}", truncate(text, COMMENT_BODY_LIMIT)),
                )
            }
            EventKind::ShiftReminder {
                department,
                start_time,
                ..
            } => (
                "תזכורת למשמרת ⏰".to_string(),
                format!("המשמרת שלך ב{department} מתחילה היום ב-{start_time}"),
            ),
        };

        Self {
            title,
            body,
            data: event.data(),
        }
    }
}

/// First `limit` characters of `text` plus an ellipsis if it is longer,
/// otherwise `text` unchanged.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_text_at_or_under_the_limit() {
        let exact = "a".repeat(MESSAGE_BODY_LIMIT);
        assert_eq!(truncate(&exact, MESSAGE_BODY_LIMIT), exact);
        assert_eq!(truncate("", MESSAGE_BODY_LIMIT), "");
    }

    #[test]
    fn truncate_cuts_one_past_the_limit() {
        let long = "a".repeat(MESSAGE_BODY_LIMIT + 1);
        let out = truncate(&long, MESSAGE_BODY_LIMIT);
        assert_eq!(out, format!("{}...", "a".repeat(MESSAGE_BODY_LIMIT)));
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let hebrew = "ש".repeat(COMMENT_BODY_LIMIT + 5);
        let out = truncate(&hebrew, COMMENT_BODY_LIMIT);
        assert_eq!(out.chars().count(), COMMENT_BODY_LIMIT + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn message_uses_sender_placeholder_when_unresolved() {
        let event = Event::new(
            "s1",
            EventKind::ShiftMessage {
                sender_id: Some("u1".into()),
                sender_name: None,
                text: "x".repeat(150),
            },
        );
        let notification = Notification::for_event(&event, None);
        assert_eq!(notification.title, "הודעה חדשה ממנהל 💬");
        assert_eq!(notification.body.chars().count(), MESSAGE_BODY_LIMIT + 3);
        assert_eq!(notification.data["type"], "shift_message");
    }

    #[test]
    fn comment_body_prefixes_commenter_and_truncates_at_80() {
        let event = Event::new(
            "t1",
            EventKind::TaskComment {
                commenter_id: Some("u1".into()),
                commenter_name: Some("Dana".into()),
                title: "Inventory".into(),
                text: "y".repeat(81),
            },
        );
        let notification = Notification::for_event(&event, Some("Dana"));
        assert_eq!(notification.title, "תגובה חדשה בInventory 💬");
        assert_eq!(notification.body, format!("Dana: {}...", "y".repeat(80)));
        assert_eq!(notification.data["taskId"], "t1");
    }

    #[test]
    fn assignment_texts_embed_department_and_date() {
        let event = Event::new(
            "s1",
            EventKind::ShiftAssigned {
                department: "Kitchen".into(),
                date: "19/10/2026".into(),
            },
        );
        let notification = Notification::for_event(&event, None);
        assert_eq!(notification.body, "שובצת למשמרת בKitchen בתאריך 19/10/2026");
    }
}
