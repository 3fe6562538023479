//! Document store operations via direct SQLx.
//!
//! Every update is a single `data || patch` statement, so concurrent writers
//! of different fields on one document never clobber each other.

use async_trait::async_trait;
use sqlx::types::Json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{Document, DocumentStore, Filter, StoredDocument};

impl super::Db {
    /// Insert or replace a whole document.
    pub async fn put_document(&self, collection: &str, id: &str, data: &Document) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data)
             VALUES ($1, $2, $3)
             ON CONFLICT (collection, id)
             DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for super::Db {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row: Option<(Json<Document>,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(data),)| data))
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = now()
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&fields))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("{collection}/{id}")));
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<StoredDocument>> {
        let sql = filter_sql(filters);
        debug!(collection, %sql, "document query");

        let mut query = sqlx::query_as::<_, (String, Json<Document>)>(&sql).bind(collection);
        for filter in filters {
            query = match filter {
                Filter::Eq { field, value } => query.bind(field.clone()).bind(Json(value.clone())),
                Filter::In { field, values } => query
                    .bind(field.clone())
                    .bind(Json(serde_json::Value::Array(values.clone()))),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(id, Json(data))| StoredDocument { id, data })
            .collect())
    }
}

/// Build the SELECT for `filters`. `$1` is the collection; each filter
/// takes two further parameters, the field name then the jsonb operand.
fn filter_sql(filters: &[Filter]) -> String {
    let mut sql = String::from("SELECT id, data FROM documents WHERE collection = $1");
    for (i, filter) in filters.iter().enumerate() {
        let field = 2 + i * 2;
        let operand = field + 1;
        match filter {
            Filter::Eq { .. } => {
                sql.push_str(&format!(" AND data -> ${field} = ${operand}::jsonb"));
            }
            // A jsonb array contains a scalar when the scalar is an element.
            Filter::In { .. } => {
                sql.push_str(&format!(" AND ${operand}::jsonb @> (data -> ${field})"));
            }
        }
    }
    sql.push_str(" ORDER BY id");
    sql
}
