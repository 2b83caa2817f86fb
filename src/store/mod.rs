//! Storage abstraction over the remote chunk store.
//!
//! The [`FragmentStore`] trait defines the read-only operations the
//! pipeline needs, enabling pluggable backends (Postgres in production,
//! in-memory for tests). Implementations must be `Send + Sync`; the
//! pipeline shares one store across concurrent invocations.
//!
//! All reads are ordered by `(document_id, sequence)` ascending, which
//! is the order the aggregator requires.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::RawFragment;

/// Read-only, paginated access to a tenant's fragments.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Distinct document ids for a tenant, ascending.
    async fn list_documents(&self, tenant_id: i64) -> Result<Vec<i64>, PipelineError>;

    /// Total fragment count for a tenant, optionally scoped to one
    /// document. Used as a pagination probe.
    async fn count_fragments(
        &self,
        tenant_id: i64,
        document_id: Option<i64>,
    ) -> Result<i64, PipelineError>;

    /// All fragments of one document, in sequence order.
    async fn fetch_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Vec<RawFragment>, PipelineError>;

    /// One page of the tenant corpus, ordered by `(document_id,
    /// sequence)`. An empty page means the stream is exhausted.
    async fn fetch_page(
        &self,
        tenant_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RawFragment>, PipelineError>;
}
