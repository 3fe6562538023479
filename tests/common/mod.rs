//! Shared fakes for integration tests: an instrumented store wrapper and a
//! transport that records what it was asked to send.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use roster_notify::error::{Error, Result};
use roster_notify::store::{Document, DocumentStore, Filter, MemoryStore, StoredDocument};
use roster_notify::transport::{MulticastMessage, MulticastResponse, PushTransport, SendResponse};
use serde_json::{Value, json};

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// MemoryStore that counts reads and can be told to fail writes.
#[derive(Default)]
pub struct TestStore {
    pub inner: MemoryStore,
    gets: AtomicUsize,
    failing_updates: Mutex<HashSet<String>>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, collection: &str, id: &str, value: Value) {
        self.inner.insert(collection, id, doc(value)).await;
    }

    pub async fn user(&self, id: &str, name: Option<&str>, tokens: &[&str]) {
        let mut value = json!({ "fcmTokens": tokens });
        if let Some(name) = name {
            value["fullName"] = json!(name);
        }
        self.insert("users", id, value).await;
    }

    pub fn fail_updates_for(&self, id: &str) {
        self.failing_updates.lock().unwrap().insert(id.to_string());
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub async fn field(&self, collection: &str, id: &str, field: &str) -> Option<Value> {
        self.inner
            .get(collection, id)
            .await
            .unwrap()
            .and_then(|d| d.get(field).cloned())
    }
}

#[async_trait]
impl DocumentStore for TestStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(collection, id).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
        if self.failing_updates.lock().unwrap().contains(id) {
            return Err(Error::Other(format!("injected write failure for {collection}/{id}")));
        }
        self.inner.update(collection, id, fields).await
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<StoredDocument>> {
        self.inner.query(collection, filters).await
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Answer,
    Unreachable,
    Hang,
}

/// Transport that records every multicast and answers per configured token.
pub struct RecordingTransport {
    mode: Mode,
    rejections: Mutex<HashMap<String, String>>,
    sent: Mutex<Vec<MulticastMessage>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::with_mode(Mode::Answer)
    }

    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            rejections: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make sends to `token` fail with `cause`.
    pub fn reject(&self, token: &str, cause: &str) {
        self.rejections
            .lock()
            .unwrap()
            .insert(token.to_string(), cause.to_string());
    }

    pub fn sent(&self) -> Vec<MulticastMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_multicast(&self, message: &MulticastMessage) -> Result<MulticastResponse> {
        self.sent.lock().unwrap().push(message.clone());
        match self.mode {
            Mode::Unreachable => Err(Error::Transport("connection refused".to_string())),
            Mode::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Mode::Answer => {
                let rejections = self.rejections.lock().unwrap();
                let responses = message
                    .tokens
                    .iter()
                    .map(|token| match rejections.get(token) {
                        Some(cause) => SendResponse::failed(cause.clone()),
                        None => SendResponse::ok(),
                    })
                    .collect();
                Ok(MulticastResponse { responses })
            }
        }
    }
}
