//! Core data models used throughout chunk-weld.
//!
//! These types represent the fragments that flow through the aggregation
//! pipeline: raw rows fetched from the store and the merged groups the
//! pipeline emits.

use serde::Serialize;

/// One row from the chunk store, before deduplication and merging.
///
/// Within a single `document_id`, `sequence` values are unique and define
/// the total order the aggregator consumes rows in.
#[derive(Debug, Clone)]
pub struct RawFragment {
    /// Store-assigned identifier. Composite `<prefix>-<suffix>`; may
    /// collide across unrelated documents.
    pub fragment_id: String,
    /// Fragment body text.
    pub content: String,
    /// Strictly increasing position within the document.
    pub sequence: i64,
    /// Owning document.
    pub document_id: i64,
    /// Label of the connector that produced this row (e.g. `"web"`,
    /// `"slack"`).
    pub source_label: String,
}

/// A merged run of adjacent fragments, the pipeline's output unit.
///
/// Immutable once emitted. The `id` is the join of all constituent
/// fragment ids, so provenance is reversible without a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedFragment {
    /// Exact sum of constituent token counts.
    pub tokens: u64,
    /// Constituent fragment ids joined with [`FRAGMENT_ID_SEP`](crate::aggregate::FRAGMENT_ID_SEP).
    pub id: String,
    /// Constituent texts joined in sequence order.
    pub content: String,
    /// Zero-based, dense, increasing per document.
    pub sequence_index: i64,
    pub document_id: i64,
    /// Subgraph tags from the last constituent row's source label, always
    /// ending with the catch-all tag.
    pub subgraph_tags: Vec<String>,
}
