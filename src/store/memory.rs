//! In-memory [`FragmentStore`] implementation for testing.
//!
//! Holds fragments behind a `std::sync::RwLock` and serves sorted copies.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::RawFragment;

use super::FragmentStore;

/// In-memory store for tests and examples.
#[derive(Default)]
pub struct MemoryStore {
    tenant_id: i64,
    fragments: RwLock<Vec<RawFragment>>,
}

impl MemoryStore {
    pub fn new(tenant_id: i64, mut fragments: Vec<RawFragment>) -> Self {
        fragments.sort_by_key(|f| (f.document_id, f.sequence));
        Self {
            tenant_id,
            fragments: RwLock::new(fragments),
        }
    }

    fn for_tenant(&self, tenant_id: i64) -> Vec<RawFragment> {
        if tenant_id != self.tenant_id {
            return Vec::new();
        }
        self.fragments.read().unwrap().clone()
    }
}

#[async_trait]
impl FragmentStore for MemoryStore {
    async fn list_documents(&self, tenant_id: i64) -> Result<Vec<i64>, PipelineError> {
        let mut docs: Vec<i64> = self
            .for_tenant(tenant_id)
            .iter()
            .map(|f| f.document_id)
            .collect();
        docs.dedup();
        Ok(docs)
    }

    async fn count_fragments(
        &self,
        tenant_id: i64,
        document_id: Option<i64>,
    ) -> Result<i64, PipelineError> {
        let fragments = self.for_tenant(tenant_id);
        let count = match document_id {
            Some(doc) => fragments.iter().filter(|f| f.document_id == doc).count(),
            None => fragments.len(),
        };
        Ok(count as i64)
    }

    async fn fetch_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Vec<RawFragment>, PipelineError> {
        Ok(self
            .for_tenant(tenant_id)
            .into_iter()
            .filter(|f| f.document_id == document_id)
            .collect())
    }

    async fn fetch_page(
        &self,
        tenant_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RawFragment>, PipelineError> {
        Ok(self
            .for_tenant(tenant_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}
