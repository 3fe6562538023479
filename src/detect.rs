//! Change detection: snapshot pairs to events.
//!
//! Everything here is pure. The same pair always yields the same events, so
//! a retried trigger recomputes an identical set.
//!
//! Appends are detected by length: when a single update appends several
//! messages or comments, only the last one produces an event.

use std::collections::BTreeSet;

use crate::model::event::{Event, EventKind};
use crate::model::record::{Decision, Shift, Snapshot, SubEntry, Task, non_empty};

const TASK_TITLE_DEFAULT: &str = "משימה חדשה";
const COMMENT_TITLE_DEFAULT: &str = "משימה";

/// Events implied by an update of one record.
///
/// Returns nothing when either snapshot is missing or the two snapshots are
/// of different collections.
pub fn detect(record_id: &str, before: Option<&Snapshot>, after: Option<&Snapshot>) -> Vec<Event> {
    match (before, after) {
        (Some(Snapshot::Shift(before)), Some(Snapshot::Shift(after))) => {
            shift_changes(record_id, before, after)
        }
        (Some(Snapshot::Task(before)), Some(Snapshot::Task(after))) => {
            task_changes(record_id, before, after)
        }
        _ => Vec::new(),
    }
}

/// Events implied by the first observation of a record: everyone already
/// assigned is told, exactly as if they had just been added.
pub fn detect_created(record_id: &str, after: Option<&Snapshot>) -> Vec<Event> {
    match after {
        Some(Snapshot::Shift(after)) => shift_assignments(record_id, &[], after),
        Some(Snapshot::Task(after)) => task_assignments(record_id, &[], after),
        None => Vec::new(),
    }
}

/// The reminder for a shift about to start, addressed to everyone assigned.
pub fn reminder_event(record_id: &str, shift: &Shift) -> Event {
    Event::new(
        record_id,
        EventKind::ShiftReminder {
            department: shift.department_or_default(),
            date: shift.date_or_default(),
            start_time: shift.start_time.clone().unwrap_or_default(),
        },
    )
    .recipients(shift.assigned_workers.iter().filter(|id| !id.is_empty()).cloned())
}

fn shift_changes(record_id: &str, before: &Shift, after: &Shift) -> Vec<Event> {
    let mut events = shift_assignments(record_id, &before.assigned_workers, after);

    for decision in newly_rejected(&before.rejected_worker_data, &after.rejected_worker_data) {
        if let Some(user_id) = &decision.user_id {
            events.push(
                Event::new(
                    record_id,
                    EventKind::ShiftRejected {
                        department: after.department_or_default(),
                        date: after.date_or_default(),
                    },
                )
                .recipient(user_id.clone()),
            );
        }
    }

    if let Some(message) = appended(&before.messages, &after.messages) {
        let author = non_empty(message.author_id.as_deref());
        events.push(
            Event::new(
                record_id,
                EventKind::ShiftMessage {
                    sender_id: author.map(str::to_string),
                    sender_name: non_empty(message.author_name.as_deref()).map(str::to_string),
                    text: message.body.clone(),
                },
            )
            .recipients(after.assigned_workers.iter().cloned())
            .excluding(author),
        );
    }

    events
}

fn task_changes(record_id: &str, before: &Task, after: &Task) -> Vec<Event> {
    let mut events = task_assignments(record_id, &before.assigned_to, after);

    if let Some(comment) = appended(&before.comments, &after.comments) {
        let author = non_empty(comment.author_id.as_deref());
        let creator = non_empty(after.created_by.as_deref());
        events.push(
            Event::new(
                record_id,
                EventKind::TaskComment {
                    commenter_id: author.map(str::to_string),
                    commenter_name: non_empty(comment.author_name.as_deref()).map(str::to_string),
                    title: non_empty(after.title.as_deref())
                        .unwrap_or(COMMENT_TITLE_DEFAULT)
                        .to_string(),
                    text: comment.body.clone(),
                },
            )
            .recipients(after.assigned_to.iter().cloned())
            .recipients(creator)
            .excluding(author),
        );
    }

    events
}

fn shift_assignments(record_id: &str, before: &[String], after: &Shift) -> Vec<Event> {
    added_members(before, &after.assigned_workers)
        .into_iter()
        .map(|user_id| {
            Event::new(
                record_id,
                EventKind::ShiftAssigned {
                    department: after.department_or_default(),
                    date: after.date_or_default(),
                },
            )
            .recipient(user_id)
        })
        .collect()
}

fn task_assignments(record_id: &str, before: &[String], after: &Task) -> Vec<Event> {
    let title = non_empty(after.title.as_deref()).unwrap_or(TASK_TITLE_DEFAULT);
    added_members(before, &after.assigned_to)
        .into_iter()
        .map(|user_id| {
            Event::new(
                record_id,
                EventKind::TaskAssigned {
                    title: title.to_string(),
                },
            )
            .recipient(user_id)
        })
        .collect()
}

/// Ids in `after` but not in `before`, first occurrence order, blanks dropped.
fn added_members<'a>(before: &[String], after: &'a [String]) -> Vec<&'a str> {
    let before: BTreeSet<&str> = before.iter().map(String::as_str).collect();
    let mut seen = BTreeSet::new();
    after
        .iter()
        .map(String::as_str)
        .filter(|id| !id.is_empty() && !before.contains(id) && seen.insert(*id))
        .collect()
}

/// Rejection entries whose worker id first appears in `after`.
fn newly_rejected<'a>(before: &[Decision], after: &'a [Decision]) -> Vec<&'a Decision> {
    let before_ids: BTreeSet<&str> = before.iter().filter_map(|d| d.user_id.as_deref()).collect();
    let after_ids: BTreeSet<&str> = after.iter().filter_map(|d| d.user_id.as_deref()).collect();

    after_ids
        .difference(&before_ids)
        .filter_map(|id| after.iter().find(|d| d.user_id.as_deref() == Some(*id)))
        .collect()
}

/// The last entry of `after` if the log grew.
fn appended<'a>(before: &[SubEntry], after: &'a [SubEntry]) -> Option<&'a SubEntry> {
    if after.len() > before.len() {
        after.last()
    } else {
        None
    }
}
