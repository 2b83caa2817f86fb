//! End-to-end pipeline tests against the in-memory store.
//!
//! A deterministic whitespace word counter stands in for the tiktoken
//! counter so token thresholds are exact in assertions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use chunk_weld::aggregate::FRAGMENT_ID_SEP;
use chunk_weld::config::{AggregationConfig, StoreConfig};
use chunk_weld::error::PipelineError;
use chunk_weld::models::RawFragment;
use chunk_weld::pipeline::Pipeline;
use chunk_weld::store::memory::MemoryStore;
use chunk_weld::store::postgres::PostgresStore;
use chunk_weld::store::FragmentStore;
use chunk_weld::tags::ProvenanceTagger;
use chunk_weld::tokens::TokenCounter;

const TENANT: i64 = 18;

/// Counts whitespace-separated words. One word, one token.
struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> Result<usize, PipelineError> {
        Ok(text.split_whitespace().count())
    }
}

/// Fails on any content containing the marker word.
struct PoisonCounter;

impl TokenCounter for PoisonCounter {
    fn count(&self, text: &str) -> Result<usize, PipelineError> {
        if text.contains("poison") {
            Err(PipelineError::tokenization("marker word encountered"))
        } else {
            Ok(text.split_whitespace().count())
        }
    }
}

/// Delegates to a [`MemoryStore`] until `fail_at_offset`, then errors.
struct FlakyStore {
    inner: MemoryStore,
    fail_at_offset: i64,
}

#[async_trait]
impl FragmentStore for FlakyStore {
    async fn list_documents(&self, tenant_id: i64) -> Result<Vec<i64>, PipelineError> {
        self.inner.list_documents(tenant_id).await
    }

    async fn count_fragments(
        &self,
        tenant_id: i64,
        document_id: Option<i64>,
    ) -> Result<i64, PipelineError> {
        self.inner.count_fragments(tenant_id, document_id).await
    }

    async fn fetch_document(
        &self,
        tenant_id: i64,
        document_id: i64,
    ) -> Result<Vec<RawFragment>, PipelineError> {
        self.inner.fetch_document(tenant_id, document_id).await
    }

    async fn fetch_page(
        &self,
        tenant_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RawFragment>, PipelineError> {
        if offset >= self.fail_at_offset {
            return Err(PipelineError::store("connection reset by peer"));
        }
        self.inner.fetch_page(tenant_id, limit, offset).await
    }
}

/// Sleeps past any reasonable test timeout before answering.
struct SlowStore;

#[async_trait]
impl FragmentStore for SlowStore {
    async fn list_documents(&self, _tenant_id: i64) -> Result<Vec<i64>, PipelineError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(Vec::new())
    }

    async fn count_fragments(
        &self,
        _tenant_id: i64,
        _document_id: Option<i64>,
    ) -> Result<i64, PipelineError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(0)
    }

    async fn fetch_document(
        &self,
        _tenant_id: i64,
        _document_id: i64,
    ) -> Result<Vec<RawFragment>, PipelineError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(Vec::new())
    }

    async fn fetch_page(
        &self,
        _tenant_id: i64,
        _limit: i64,
        _offset: i64,
    ) -> Result<Vec<RawFragment>, PipelineError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(Vec::new())
    }
}

fn frag(id: &str, doc: i64, seq: i64, words: usize, source: &str) -> RawFragment {
    RawFragment {
        fragment_id: id.to_string(),
        content: vec!["word"; words].join(" "),
        sequence: seq,
        document_id: doc,
        source_label: source.to_string(),
    }
}

fn tagger() -> ProvenanceTagger {
    let mut sources = BTreeMap::new();
    sources.insert("web".to_string(), vec!["WEB".to_string()]);
    sources.insert("slack".to_string(), vec!["SLACK".to_string()]);
    ProvenanceTagger::new(sources)
}

fn pipeline(
    store: Arc<dyn FragmentStore>,
    counter: Arc<dyn TokenCounter>,
    min_tokens: u64,
    page_size: i64,
) -> Pipeline {
    Pipeline::new(
        store,
        counter,
        tagger(),
        &AggregationConfig {
            min_tokens,
            page_size,
        },
        Duration::from_secs(5),
    )
    .unwrap()
}

#[test]
fn construction_rejects_invalid_config() {
    let store = Arc::new(MemoryStore::new(TENANT, Vec::new()));
    let result = Pipeline::new(
        store,
        Arc::new(WordCounter),
        tagger(),
        &AggregationConfig {
            min_tokens: 0,
            page_size: 100,
        },
        Duration::from_secs(5),
    );
    assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
}

#[tokio::test]
async fn single_document_merges_to_threshold() {
    let store = Arc::new(MemoryStore::new(
        TENANT,
        vec![
            frag("a-1", 1, 0, 4, "web"),
            frag("b-1", 1, 1, 7, "web"),
            frag("c-1", 1, 2, 2, "web"),
        ],
    ));
    let run = pipeline(store, Arc::new(WordCounter), 10, 100)
        .aggregate_document(TENANT, 1)
        .await;

    assert!(run.is_complete());
    assert_eq!(run.fragments.len(), 2);
    assert_eq!(run.fragments[0].tokens, 11);
    assert_eq!(run.fragments[0].id, format!("a-1{FRAGMENT_ID_SEP}b-1"));
    assert_eq!(run.fragments[0].sequence_index, 0);
    assert_eq!(run.fragments[0].subgraph_tags, vec!["WEB", "ALL"]);
    assert_eq!(run.fragments[1].tokens, 2);
    assert_eq!(run.fragments[1].sequence_index, 1);

    let keyed = run.into_keyed();
    assert!(keyed.contains_key(&format!("a-1{FRAGMENT_ID_SEP}b-1")));
    assert!(keyed.contains_key("c-1"));
}

#[tokio::test]
async fn single_document_drops_majority_partition() {
    let store = Arc::new(MemoryStore::new(
        TENANT,
        vec![
            frag("a-1", 1, 0, 3, "web"),
            frag("b-1", 1, 1, 3, "web"),
            frag("c-2", 1, 2, 3, "web"),
        ],
    ));
    let run = pipeline(store, Arc::new(WordCounter), 10, 100)
        .aggregate_document(TENANT, 1)
        .await;

    assert_eq!(run.rows_fetched, 3);
    assert_eq!(run.rows_kept, 1);
    assert_eq!(run.fragments.len(), 1);
    assert_eq!(run.fragments[0].id, "c-2");
}

#[tokio::test]
async fn unknown_source_label_still_gets_catch_all() {
    let store = Arc::new(MemoryStore::new(
        TENANT,
        vec![frag("a-1", 1, 0, 3, "mystery")],
    ));
    let run = pipeline(store, Arc::new(WordCounter), 10, 100)
        .aggregate_document(TENANT, 1)
        .await;

    assert_eq!(run.fragments[0].subgraph_tags, vec!["ALL"]);
}

#[tokio::test]
async fn corpus_flushes_on_document_boundary() {
    let store = Arc::new(MemoryStore::new(
        TENANT,
        vec![frag("a-1", 1, 0, 3, "web"), frag("b-1", 2, 0, 5, "slack")],
    ));
    let run = pipeline(store, Arc::new(WordCounter), 10, 100)
        .aggregate_corpus(TENANT, &CancellationToken::new())
        .await;

    assert!(run.is_complete());
    assert_eq!(run.fragments.len(), 2);
    assert_eq!(run.fragments[0].document_id, 1);
    assert_eq!(run.fragments[0].tokens, 3);
    assert_eq!(run.fragments[0].sequence_index, 0);
    assert_eq!(run.fragments[1].document_id, 2);
    assert_eq!(run.fragments[1].tokens, 5);
    assert_eq!(run.fragments[1].sequence_index, 0);
    assert_eq!(run.fragments[1].subgraph_tags, vec!["SLACK", "ALL"]);
}

#[tokio::test]
async fn corpus_carries_accumulation_across_pages() {
    let store = Arc::new(MemoryStore::new(
        TENANT,
        vec![
            frag("a-1", 1, 0, 3, "web"),
            frag("b-1", 1, 1, 3, "web"),
            frag("c-1", 1, 2, 3, "web"),
            frag("d-1", 1, 3, 3, "web"),
        ],
    ));
    // Two rows per page; the document spans two pages.
    let run = pipeline(store, Arc::new(WordCounter), 10, 2)
        .aggregate_corpus(TENANT, &CancellationToken::new())
        .await;

    assert!(run.is_complete());
    assert_eq!(run.fragments.len(), 1);
    assert_eq!(run.fragments[0].tokens, 12);
    assert_eq!(
        run.fragments[0].id,
        ["a-1", "b-1", "c-1", "d-1"].join(FRAGMENT_ID_SEP)
    );
}

#[tokio::test]
async fn corpus_dedup_is_page_scoped() {
    // Page 1 keeps partition "2", page 2 keeps partition "1" — the
    // heuristic runs per fetched page, not per document.
    let store = Arc::new(MemoryStore::new(
        TENANT,
        vec![
            frag("a-1", 1, 0, 2, "web"),
            frag("b-1", 1, 1, 2, "web"),
            frag("c-2", 1, 2, 2, "web"),
            frag("d-2", 1, 3, 2, "web"),
            frag("e-2", 1, 4, 2, "web"),
            frag("f-1", 1, 5, 2, "web"),
        ],
    ));
    let run = pipeline(store, Arc::new(WordCounter), 100, 3)
        .aggregate_corpus(TENANT, &CancellationToken::new())
        .await;

    assert_eq!(run.rows_fetched, 6);
    assert_eq!(run.rows_kept, 2);
    assert_eq!(run.fragments.len(), 1);
    assert_eq!(run.fragments[0].id, format!("c-2{FRAGMENT_ID_SEP}f-1"));
}

#[tokio::test]
async fn store_failure_returns_partial_run_with_error() {
    let inner = MemoryStore::new(
        TENANT,
        vec![
            frag("a-1", 1, 0, 3, "web"),
            frag("b-1", 1, 1, 3, "web"),
            frag("c-1", 1, 2, 3, "web"),
            frag("d-1", 1, 3, 3, "web"),
        ],
    );
    let store = Arc::new(FlakyStore {
        inner,
        fail_at_offset: 2,
    });
    let run = pipeline(store, Arc::new(WordCounter), 100, 2)
        .aggregate_corpus(TENANT, &CancellationToken::new())
        .await;

    assert!(matches!(
        run.error,
        Some(PipelineError::StoreUnavailable { .. })
    ));
    assert!(!run.is_complete());
    // The first page was aggregated and flushed before the failure.
    assert_eq!(run.fragments.len(), 1);
    assert_eq!(run.fragments[0].id, format!("a-1{FRAGMENT_ID_SEP}b-1"));
    assert_eq!(run.fragments[0].tokens, 6);
}

#[tokio::test]
async fn pre_cancelled_corpus_run_stops_before_first_page() {
    let store = Arc::new(MemoryStore::new(
        TENANT,
        vec![frag("a-1", 1, 0, 3, "web")],
    ));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let run = pipeline(store, Arc::new(WordCounter), 10, 100)
        .aggregate_corpus(TENANT, &cancel)
        .await;

    assert!(run.cancelled);
    assert!(!run.is_complete());
    assert!(run.fragments.is_empty());
}

#[tokio::test]
async fn tokenizer_failure_skips_only_that_document() {
    let mut poisoned = frag("p-1", 2, 0, 3, "web");
    poisoned.content = "this row is poison".to_string();

    let store = Arc::new(MemoryStore::new(
        TENANT,
        vec![
            frag("a-1", 1, 0, 3, "web"),
            poisoned,
            frag("q-1", 2, 1, 3, "web"),
            frag("z-1", 3, 0, 4, "slack"),
        ],
    ));
    let run = pipeline(store, Arc::new(PoisonCounter), 10, 100)
        .aggregate_corpus(TENANT, &CancellationToken::new())
        .await;

    assert_eq!(run.skipped_documents.len(), 1);
    assert_eq!(run.skipped_documents[0].0, 2);
    assert!(!run.is_complete());

    let docs: Vec<i64> = run.fragments.iter().map(|f| f.document_id).collect();
    assert_eq!(docs, vec![1, 3]);
    assert_eq!(run.fragments[1].subgraph_tags, vec!["SLACK", "ALL"]);
}

#[tokio::test]
async fn reruns_are_byte_identical() {
    let fragments = vec![
        frag("a-1", 1, 0, 4, "web"),
        frag("b-1", 1, 1, 7, "web"),
        frag("c-1", 2, 0, 2, "slack"),
    ];
    let store = Arc::new(MemoryStore::new(TENANT, fragments));

    let p = pipeline(store, Arc::new(WordCounter), 10, 2);
    let first = p.aggregate_corpus(TENANT, &CancellationToken::new()).await;
    let second = p.aggregate_corpus(TENANT, &CancellationToken::new()).await;

    assert_eq!(first.fragments, second.fragments);
}

#[tokio::test]
async fn slow_store_call_surfaces_as_store_unavailable() {
    let p = Pipeline::new(
        Arc::new(SlowStore),
        Arc::new(WordCounter),
        tagger(),
        &AggregationConfig {
            min_tokens: 10,
            page_size: 100,
        },
        Duration::from_millis(100),
    )
    .unwrap();

    let single = p.aggregate_document(TENANT, 1).await;
    assert!(matches!(
        single.error,
        Some(PipelineError::StoreUnavailable { .. })
    ));
    assert!(!single.is_complete());
    assert!(single.fragments.is_empty());

    let corpus = p.aggregate_corpus(TENANT, &CancellationToken::new()).await;
    assert!(matches!(
        corpus.error,
        Some(PipelineError::StoreUnavailable { .. })
    ));
    assert!(!corpus.is_complete());
    assert!(corpus.fragments.is_empty());
}

#[tokio::test]
async fn postgres_store_rejects_bad_table_identifier() {
    let config = StoreConfig {
        url: "postgres://weld_ro@localhost:5432/foundry".to_string(),
        table: "chunks; DROP TABLE chunks".to_string(),
        max_connections: 1,
        timeout_secs: 5,
    };
    // Fails on the identifier check, before any connection is dialed.
    let err = PostgresStore::connect(&config).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig { .. }));
}

#[tokio::test]
async fn unknown_tenant_yields_empty_complete_run() {
    let store = Arc::new(MemoryStore::new(TENANT, vec![frag("a-1", 1, 0, 3, "web")]));
    let run = pipeline(store, Arc::new(WordCounter), 10, 100)
        .aggregate_corpus(999, &CancellationToken::new())
        .await;

    assert!(run.is_complete());
    assert!(run.fragments.is_empty());
}
