//! Postgres-backed [`FragmentStore`].
//!
//! Reads the chunk view the upstream ingestion jobs maintain. The table
//! name comes from configuration because it differs per deployment; it
//! is validated as a bare identifier before ever being interpolated
//! into SQL (sqlx cannot bind identifiers).

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::config::{check_table_identifier, StoreConfig};
use crate::error::PipelineError;
use crate::models::RawFragment;

use super::FragmentStore;

/// Fragment store reading from a Postgres chunk table or view.
#[derive(Debug)]
pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    /// Validate the configured table identifier, then connect a pool.
    ///
    /// The identifier check runs here as well as in `Config::validate`
    /// because a `StoreConfig` can be built programmatically without
    /// ever passing through config loading.
    pub async fn connect(config: &StoreConfig) -> Result<Self, PipelineError> {
        check_table_identifier(&config.table)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self {
            pool,
            table: config.table.clone(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_fragment(row: &sqlx::postgres::PgRow) -> RawFragment {
        RawFragment {
            fragment_id: row.get("chunk_id"),
            content: row.get("content"),
            sequence: row.get("sequence"),
            document_id: row.get("source_id"),
            source_label: row.get("source"),
        }
    }
}

#[async_trait]
impl FragmentStore for PostgresStore {
    async fn list_documents(&self, tenant_id: i64) -> Result<Vec<i64>, PipelineError> {
        let rows = sqlx::query(&format!(
            "SELECT DISTINCT source_id FROM {} WHERE company_id = $1 ORDER BY source_id",
            self.table
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("source_id")).collect())
    }

    async fn count_fragments(
        &self,
        tenant_id: i64,
        document_id: Option<i64>,
    ) -> Result<i64, PipelineError> {
        let count: i64 = match document_id {
            Some(doc) => {
                sqlx::query_scalar(&format!(
                    "SELECT COUNT(*) FROM {} WHERE company_id = $1 AND source_id = $2",
                    self.table
                ))
                .bind(tenant_id)
                .bind(doc)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(&format!(
                    "SELECT COUNT(*) FROM {} WHERE company_id = $1",
                    self.table
                ))
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(count)
    }

    async fn fetch_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Vec<RawFragment>, PipelineError> {
        let rows = sqlx::query(&format!(
            "SELECT chunk_id, content, sequence, source, source_id \
             FROM {} WHERE company_id = $1 AND source_id = $2 \
             ORDER BY sequence",
            self.table
        ))
        .bind(tenant_id)
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_fragment).collect())
    }

    async fn fetch_page(
        &self,
        tenant_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RawFragment>, PipelineError> {
        let rows = sqlx::query(&format!(
            "SELECT chunk_id, content, sequence, source, source_id \
             FROM {} WHERE company_id = $1 \
             ORDER BY source_id, sequence LIMIT $2 OFFSET $3",
            self.table
        ))
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_fragment).collect())
    }
}
