//! Postgres-backed document store.
//!
//! Documents live in a single `documents(collection, id, data jsonb)` table;
//! see [`documents`] for the [`crate::store::DocumentStore`] implementation.

pub mod documents;

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::error::{Error, Result};

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the documents database.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Open a pool against `url`. Fails if no connection can be made.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        info!(max_connections = MAX_CONNECTIONS, "document store connected");
        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("documents migration failed: {e}")))
    }

    /// Check the pool can reach the `documents` table.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1 FROM documents LIMIT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
