//! End-to-end trigger handling against the in-memory store.

mod common;

use std::sync::Arc;

use common::{RecordingTransport, TestStore, doc};
use roster_notify::engine::{EngineConfig, NotificationEngine, Trigger};
use roster_notify::model::delivery::DispatchStatus;
use roster_notify::model::record::Collection;
use serde_json::json;

async fn setup() -> (Arc<TestStore>, Arc<RecordingTransport>, NotificationEngine) {
    let store = Arc::new(TestStore::new());
    store.user("u1", Some("Dana"), &["tok-1"]).await;
    store.user("u2", Some("Noa"), &["tok-2"]).await;
    store.user("u3", Some("Avi"), &["tok-3"]).await;
    store.user("mgr", Some("Yossi"), &["tok-mgr"]).await;
    let transport = Arc::new(RecordingTransport::new());
    let engine = NotificationEngine::new(store.clone(), transport.clone(), EngineConfig::default());
    (store, transport, engine)
}

#[tokio::test]
async fn added_workers_each_get_one_assignment() {
    let (_, transport, engine) = setup().await;
    let before = doc(json!({
        "assignedWorkers": [],
        "department": "Kitchen",
        "date": "19/10/2026"
    }));
    let after = doc(json!({
        "assignedWorkers": ["u1", "u2"],
        "department": "Kitchen",
        "date": "19/10/2026"
    }));

    let report = engine
        .on_updated(Collection::Shifts, "s1", Some(&before), Some(&after))
        .await;

    assert_eq!(report.events, 2);
    let mut tokens: Vec<_> = transport.sent().into_iter().flat_map(|m| m.tokens).collect();
    tokens.sort();
    assert_eq!(tokens, vec!["tok-1", "tok-2"]);
    assert!(
        transport
            .sent()
            .iter()
            .all(|m| m.body == "שובצת למשמרת בKitchen בתאריך 19/10/2026")
    );
}

#[tokio::test]
async fn rejection_notifies_only_the_rejected_worker() {
    let (_, transport, engine) = setup().await;
    let before = doc(json!({ "assignedWorkers": ["u1"], "rejectedWorkerData": [] }));
    let after = doc(json!({
        "assignedWorkers": ["u1"],
        "rejectedWorkerData": [{ "userId": "u3", "reason": "full" }]
    }));

    let report = engine
        .on_updated(Collection::Shifts, "s1", Some(&before), Some(&after))
        .await;

    assert_eq!(report.events, 1);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tokens, vec!["tok-3"]);
    assert_eq!(sent[0].data["type"], "shift_rejected");
    assert_eq!(
        sent[0].body,
        "הבקשה שלך למשמרת בUnknown בתאריך Unknown date לא אושרה"
    );
}

#[tokio::test]
async fn legacy_rejection_id_field_is_honored() {
    let (_, transport, engine) = setup().await;
    let before = doc(json!({ "rejectedWorkerData": [] }));
    let after = doc(json!({ "rejectedWorkerData": [{ "odekId": "u2" }] }));

    engine
        .on_updated(Collection::Shifts, "s1", Some(&before), Some(&after))
        .await;

    assert_eq!(transport.sent()[0].tokens, vec!["tok-2"]);
}

#[tokio::test]
async fn comment_reaches_assignees_and_creator_but_not_author() {
    let (_, transport, engine) = setup().await;
    let before = doc(json!({
        "assignedTo": ["u1", "u2"],
        "createdBy": "u3",
        "title": "Inventory",
        "comments": []
    }));
    let after = doc(json!({
        "assignedTo": ["u1", "u2"],
        "createdBy": "u3",
        "title": "Inventory",
        "comments": [{ "userId": "u1", "userName": "Dana", "text": "Done with shelf A" }]
    }));

    let report = engine
        .on_updated(Collection::Tasks, "t1", Some(&before), Some(&after))
        .await;

    assert_eq!(report.events, 1);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tokens, vec!["tok-2", "tok-3"]);
    assert_eq!(sent[0].title, "תגובה חדשה בInventory 💬");
    assert_eq!(sent[0].body, "Dana: Done with shelf A");
    assert_eq!(sent[0].data["taskId"], "t1");
}

#[tokio::test]
async fn shift_message_goes_to_every_assignee_except_sender() {
    let (_, transport, engine) = setup().await;
    let before = doc(json!({ "assignedWorkers": ["u1", "u2", "u3"], "messages": [] }));
    let after = doc(json!({
        "assignedWorkers": ["u1", "u2", "u3"],
        "messages": [{ "senderId": "u2", "text": "Running late" }]
    }));

    engine
        .on_updated(Collection::Shifts, "s1", Some(&before), Some(&after))
        .await;

    let sent = transport.sent();
    assert_eq!(sent[0].tokens, vec!["tok-1", "tok-3"]);
    // No embedded name: looked up from the sender's profile.
    assert_eq!(sent[0].title, "הודעה חדשה מNoa 💬");
}

#[tokio::test]
async fn absent_or_malformed_snapshots_are_no_ops() {
    let (_, transport, engine) = setup().await;
    let after = doc(json!({ "assignedWorkers": ["u1"] }));
    let malformed = doc(json!({ "assignedWorkers": "u1" }));

    let deleted = engine
        .on_updated(Collection::Shifts, "s1", Some(&after), None)
        .await;
    let unseen = engine
        .on_updated(Collection::Shifts, "s1", None, Some(&after))
        .await;
    let garbled = engine
        .on_updated(Collection::Shifts, "s1", Some(&malformed), Some(&after))
        .await;

    assert_eq!(deleted.events + unseen.events + garbled.events, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn unchanged_record_emits_nothing() {
    let (_, transport, engine) = setup().await;
    let snapshot = doc(json!({
        "assignedWorkers": ["u1"],
        "messages": [{ "senderId": "u1", "text": "hi" }]
    }));

    let report = engine
        .on_updated(Collection::Shifts, "s1", Some(&snapshot), Some(&snapshot))
        .await;

    assert_eq!(report.events, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn created_task_notifies_initial_assignees() {
    let (_, transport, engine) = setup().await;
    let report = engine
        .handle(Trigger::Created {
            collection: Collection::Tasks,
            record_id: "t9".into(),
            after: Some(doc(json!({ "assignedTo": ["u1"], "createdBy": "mgr" }))),
        })
        .await
        .unwrap();

    assert_eq!(report.events, 1);
    let sent = transport.sent();
    assert_eq!(sent[0].tokens, vec!["tok-1"]);
    assert_eq!(sent[0].body, "קיבלת משימה חדשה: משימה חדשה");
    assert_eq!(sent[0].data["type"], "task_assigned");
}

#[tokio::test]
async fn one_failed_event_does_not_block_its_siblings() {
    let (store, transport, engine) = setup().await;
    store.user("u4", None, &[]).await;
    let before = doc(json!({ "assignedWorkers": [] }));
    let after = doc(json!({ "assignedWorkers": ["u4", "u1"] }));

    let report = engine
        .handle(Trigger::Updated {
            collection: Collection::Shifts,
            record_id: "s1".into(),
            before: Some(before),
            after: Some(after),
        })
        .await
        .unwrap();

    assert_eq!(report.deliveries.len(), 2);
    let statuses: Vec<_> = report.deliveries.iter().map(|d| d.status.clone()).collect();
    assert!(statuses.contains(&DispatchStatus::NoEndpoints));
    assert!(statuses.contains(&DispatchStatus::Sent));
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn malformed_entries_do_not_hide_an_assignment() {
    let (_, transport, engine) = setup().await;
    let before = doc(json!({ "assignedWorkers": [] }));
    let odd_message = doc(json!({
        "assignedWorkers": ["u1"],
        "messages": [{ "senderId": "u9", "userId": "u9", "text": "hi" }]
    }));
    let odd_rejection = doc(json!({
        "assignedWorkers": ["u1"],
        "rejectedWorkerData": [{ "userId": 42 }]
    }));

    for after in [odd_message, odd_rejection] {
        let report = engine
            .on_updated(Collection::Shifts, "s1", Some(&before), Some(&after))
            .await;
        let types: Vec<_> = report.deliveries.iter().map(|d| d.event_type).collect();
        assert!(types.contains(&"shift_assigned"), "got {types:?}");
    }

    let assigned = transport
        .sent()
        .iter()
        .filter(|m| m.data["type"] == "shift_assigned")
        .count();
    assert_eq!(assigned, 2);
}
