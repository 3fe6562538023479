//! The document store contract.
//!
//! The store is the system of record for shifts, tasks and users. The
//! engine only needs point reads, single-document partial updates, and
//! filtered scans of one collection. [`MemoryStore`] backs tests and local
//! runs; [`crate::db::Db`] is the Postgres implementation.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A document's fields.
pub type Document = serde_json::Map<String, Value>;

/// A document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

/// A predicate on one top-level field. Filters passed together are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value.
    Eq { field: String, value: Value },
    /// Field equals one of the values.
    In { field: String, values: Vec<Value> },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn within<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluate against a document held in memory.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => document.get(field) == Some(value),
            Filter::In { field, values } => document
                .get(field)
                .is_some_and(|actual| values.contains(actual)),
        }
    }
}

/// Abstraction over the external document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document. `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Merge `fields` into an existing document atomically.
    ///
    /// Returns [`crate::error::Error::NotFound`] if the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()>;

    /// All documents in `collection` matching every filter.
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<StoredDocument>>;
}
