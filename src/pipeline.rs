//! Pipeline orchestration: fetch → dedup → aggregate → tag.
//!
//! One sequential stream per invocation; the aggregator is never shared
//! across concurrent writers. Two operating modes drive the same
//! [`Aggregator`] core:
//!
//! - **single-document**: fetch all rows for one document, deduplicate
//!   the batch, aggregate in memory.
//! - **corpus**: paginate across the whole tenant ordered by
//!   `(document_id, sequence)`, deduplicate per fetched page, carry
//!   aggregation state across page boundaries, flush on document change.
//!
//! Corpus mode prefetches one page ahead while the previous page is
//! being aggregated, and checks for cooperative cancellation before
//! consuming each page. Every store call runs under a timeout; a
//! timeout surfaces as `StoreUnavailable`.
//!
//! Failure is a value here, not an exception: a run always returns a
//! [`PipelineRun`] carrying whatever was flushed before the failure,
//! so callers can distinguish a degraded run from an empty corpus.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::{Aggregator, MergedGroup};
use crate::config::AggregationConfig;
use crate::dedup::unique_fragment_indices;
use crate::error::PipelineError;
use crate::models::{AggregatedFragment, RawFragment};
use crate::store::FragmentStore;
use crate::tags::ProvenanceTagger;
use crate::tokens::TokenCounter;

/// Outcome of one pipeline invocation.
///
/// `fragments` is in emission order and is valid even when `error` is
/// set — it is the self-consistent prefix processed before the failure.
#[derive(Debug, Default)]
pub struct PipelineRun {
    pub fragments: Vec<AggregatedFragment>,
    /// Set when the run aborted early (store failure, or a tokenizer
    /// failure in single-document mode).
    pub error: Option<PipelineError>,
    /// Documents abandoned mid-run in corpus mode, with the failure
    /// that killed each. Sibling documents are unaffected.
    pub skipped_documents: Vec<(i64, PipelineError)>,
    /// True when the run stopped at a cancellation point.
    pub cancelled: bool,
    pub rows_fetched: u64,
    pub rows_kept: u64,
}

impl PipelineRun {
    /// Whether the run covered the full requested stream.
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.skipped_documents.is_empty() && !self.cancelled
    }

    /// The output keyed by composite fragment id. Keys are unique by
    /// construction since every constituent id appears exactly once.
    pub fn into_keyed(self) -> HashMap<String, AggregatedFragment> {
        self.fragments
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect()
    }
}

/// Token-bounded chunk aggregation pipeline.
///
/// Collaborators (store, tokenizer, tag table) are injected at
/// construction; there is no ambient state. A `Pipeline` is cheap to
/// share and independent invocations may run concurrently.
pub struct Pipeline {
    store: Arc<dyn FragmentStore>,
    counter: Arc<dyn TokenCounter>,
    tagger: ProvenanceTagger,
    min_tokens: u64,
    page_size: i64,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn FragmentStore>,
        counter: Arc<dyn TokenCounter>,
        tagger: ProvenanceTagger,
        aggregation: &AggregationConfig,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        if aggregation.min_tokens == 0 {
            return Err(PipelineError::config("min_tokens must be >= 1"));
        }
        if aggregation.page_size < 1 {
            return Err(PipelineError::config("page_size must be >= 1"));
        }
        if timeout.is_zero() {
            return Err(PipelineError::config("store timeout must be non-zero"));
        }
        Ok(Self {
            store,
            counter,
            tagger,
            min_tokens: aggregation.min_tokens,
            page_size: aggregation.page_size,
            timeout,
        })
    }

    /// Aggregate one document's fragments.
    pub async fn aggregate_document(&self, tenant_id: i64, document_id: i64) -> PipelineRun {
        let mut run = PipelineRun::default();
        let mut agg = match Aggregator::new(self.min_tokens) {
            Ok(agg) => agg,
            Err(e) => {
                run.error = Some(e);
                return run;
            }
        };

        info!(tenant_id, document_id, "aggregating single document");

        let rows = match self
            .with_timeout(self.store.fetch_document(tenant_id, document_id))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(tenant_id, document_id, error = %e, "document fetch failed");
                run.error = Some(e);
                return run;
            }
        };

        run.rows_fetched = rows.len() as u64;
        let keep = {
            let ids: Vec<&str> = rows.iter().map(|r| r.fragment_id.as_str()).collect();
            unique_fragment_indices(&ids)
        };
        run.rows_kept = keep.len() as u64;

        for idx in keep {
            let fragment = &rows[idx];
            let tokens = match self.counter.count(&fragment.content) {
                Ok(tokens) => tokens as u64,
                Err(e) => {
                    warn!(document_id, error = %e, "tokenizer failed, aborting document");
                    agg.discard_current();
                    run.error = Some(e);
                    return run;
                }
            };
            for group in agg.push(fragment, tokens) {
                self.emit(&mut run, group);
            }
        }
        if let Some(group) = agg.finish() {
            self.emit(&mut run, group);
        }

        info!(
            tenant_id,
            document_id,
            rows = run.rows_fetched,
            groups = run.fragments.len(),
            "single document done"
        );
        run
    }

    /// Aggregate the whole tenant corpus, page by page.
    ///
    /// `cancel` is honored before each page is consumed; a cancelled run
    /// flushes its trailing accumulation and returns what it has.
    pub async fn aggregate_corpus(&self, tenant_id: i64, cancel: &CancellationToken) -> PipelineRun {
        let mut run = PipelineRun::default();
        let mut agg = match Aggregator::new(self.min_tokens) {
            Ok(agg) => agg,
            Err(e) => {
                run.error = Some(e);
                return run;
            }
        };

        info!(tenant_id, page_size = self.page_size, "aggregating corpus");

        let mut failed_document: Option<i64> = None;
        let mut offset: i64 = 0;
        // Depth-1 prefetch: the next page downloads while this one is
        // being aggregated. Ordering is safe because aggregation stays
        // on this task and pages arrive in offset order.
        let mut pending: Option<JoinHandle<Result<Vec<RawFragment>, PipelineError>>> =
            Some(self.spawn_fetch(tenant_id, offset));

        while let Some(handle) = pending.take() {
            if cancel.is_cancelled() {
                info!(tenant_id, offset, "cancelled between pages");
                handle.abort();
                run.cancelled = true;
                break;
            }

            let page = match handle.await {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => {
                    warn!(tenant_id, offset, error = %e, "page fetch failed, returning partial run");
                    run.error = Some(e);
                    break;
                }
                Err(e) => {
                    run.error = Some(PipelineError::store(format!("page fetch task failed: {e}")));
                    break;
                }
            };
            if page.is_empty() {
                break;
            }

            debug!(tenant_id, offset, rows = page.len(), "page fetched");
            offset += page.len() as i64;
            if page.len() as i64 == self.page_size {
                pending = Some(self.spawn_fetch(tenant_id, offset));
            }

            // Dedup scope is the fetched page, not the document. A
            // pagination artifact inherited from the store's history;
            // kept for compatibility (see DESIGN.md).
            let keep = {
                let ids: Vec<&str> = page.iter().map(|r| r.fragment_id.as_str()).collect();
                unique_fragment_indices(&ids)
            };
            run.rows_fetched += page.len() as u64;
            run.rows_kept += keep.len() as u64;

            for idx in keep {
                let fragment = &page[idx];
                if failed_document == Some(fragment.document_id) {
                    continue;
                }
                let tokens = match self.counter.count(&fragment.content) {
                    Ok(tokens) => tokens as u64,
                    Err(e) => {
                        warn!(
                            document_id = fragment.document_id,
                            error = %e,
                            "tokenizer failed, skipping remainder of document"
                        );
                        if agg.current_document() == Some(fragment.document_id) {
                            agg.discard_current();
                        }
                        failed_document = Some(fragment.document_id);
                        run.skipped_documents.push((fragment.document_id, e));
                        continue;
                    }
                };
                for group in agg.push(fragment, tokens) {
                    self.emit(&mut run, group);
                }
            }
        }

        if let Some(group) = agg.finish() {
            self.emit(&mut run, group);
        }

        info!(
            tenant_id,
            rows = run.rows_fetched,
            groups = run.fragments.len(),
            complete = run.is_complete(),
            "corpus run done"
        );
        run
    }

    fn emit(&self, run: &mut PipelineRun, group: MergedGroup) {
        let tags = self.tagger.tag(&group.last_source);
        run.fragments.push(group.into_fragment(tags));
    }

    fn spawn_fetch(
        &self,
        tenant_id: i64,
        offset: i64,
    ) -> JoinHandle<Result<Vec<RawFragment>, PipelineError>> {
        let store = Arc::clone(&self.store);
        let limit = self.page_size;
        let timeout = self.timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, store.fetch_page(tenant_id, limit, offset)).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::store(format!(
                    "fetch_page timed out after {timeout:?}"
                ))),
            }
        })
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::store(format!(
                "store call timed out after {:?}",
                self.timeout
            ))),
        }
    }
}
