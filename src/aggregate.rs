//! Greedy token-bounded merge of adjacent fragments.
//!
//! The [`Aggregator`] consumes rows strictly in `(document_id, sequence)`
//! order and folds them into groups whose token sum meets a configured
//! minimum. A group closes when the running sum reaches the minimum,
//! when the document id changes, or when the stream ends with a partial
//! accumulation. Both pipeline modes drive this one state machine; it
//! carries accumulation across page boundaries untouched.
//!
//! The aggregator is total: given well-formed input it cannot fail, and
//! it knows nothing about storage or tokenization errors upstream. If
//! the stream ends early, its output is self-consistent for the prefix
//! it saw.

use crate::error::PipelineError;
use crate::models::{AggregatedFragment, RawFragment};

/// Separator joining constituent fragment ids into a group id.
pub const FRAGMENT_ID_SEP: &str = "<CID>";

/// Separator joining constituent texts into a group body.
pub const CONTENT_SEP: &str = "\n\n";

/// A closed group, before provenance tagging.
///
/// Carries the source label of its last constituent row so the tagger
/// can resolve subgraph tags.
#[derive(Debug, Clone)]
pub struct MergedGroup {
    pub tokens: u64,
    pub fragment_ids: Vec<String>,
    pub contents: Vec<String>,
    pub sequence_index: i64,
    pub document_id: i64,
    pub last_source: String,
}

impl MergedGroup {
    /// Finalize into an [`AggregatedFragment`] with the given tags.
    pub fn into_fragment(self, subgraph_tags: Vec<String>) -> AggregatedFragment {
        AggregatedFragment {
            tokens: self.tokens,
            id: self.fragment_ids.join(FRAGMENT_ID_SEP),
            content: self.contents.join(CONTENT_SEP),
            sequence_index: self.sequence_index,
            document_id: self.document_id,
            subgraph_tags,
        }
    }
}

/// Per-document accumulation state machine.
pub struct Aggregator {
    min_tokens: u64,
    document_id: Option<i64>,
    ids: Vec<String>,
    contents: Vec<String>,
    tokens: u64,
    output_sequence: i64,
    last_source: String,
}

impl Aggregator {
    /// Create an aggregator with the given token minimum.
    ///
    /// A zero minimum would emit a group per fragment forever and is
    /// rejected as [`PipelineError::InvalidConfig`].
    pub fn new(min_tokens: u64) -> Result<Self, PipelineError> {
        if min_tokens == 0 {
            return Err(PipelineError::config("min_tokens must be >= 1"));
        }
        Ok(Self {
            min_tokens,
            document_id: None,
            ids: Vec::new(),
            contents: Vec::new(),
            tokens: 0,
            output_sequence: 0,
            last_source: String::new(),
        })
    }

    /// Feed the next fragment, with its token count, in stream order.
    ///
    /// Returns zero, one, or two closed groups: a boundary flush for the
    /// outgoing document (if the document id changed with a non-empty
    /// accumulation) followed by a threshold emission for the incoming
    /// fragment's document.
    pub fn push(&mut self, fragment: &RawFragment, tokens: u64) -> Vec<MergedGroup> {
        let mut out = Vec::new();

        if self.document_id != Some(fragment.document_id) {
            if let Some(group) = self.take_group() {
                out.push(group);
            }
            self.document_id = Some(fragment.document_id);
            self.output_sequence = 0;
        }

        self.ids.push(fragment.fragment_id.clone());
        self.contents.push(fragment.content.clone());
        self.tokens += tokens;
        self.last_source = fragment.source_label.clone();

        // Threshold check only after appending, so a single oversized
        // fragment closes as its own group.
        if self.tokens >= self.min_tokens {
            if let Some(group) = self.take_group() {
                out.push(group);
            }
        }

        out
    }

    /// Flush the trailing partial accumulation at end of stream.
    pub fn finish(&mut self) -> Option<MergedGroup> {
        self.take_group()
    }

    /// Document the buffered accumulation belongs to, if any rows are
    /// buffered.
    pub fn current_document(&self) -> Option<i64> {
        if self.ids.is_empty() {
            None
        } else {
            self.document_id
        }
    }

    /// Drop any in-progress accumulation without emitting it.
    ///
    /// Used when the current document turns out to be unusable (e.g. a
    /// tokenizer failure mid-document); sibling documents are unaffected.
    pub fn discard_current(&mut self) {
        self.ids.clear();
        self.contents.clear();
        self.tokens = 0;
        self.document_id = None;
        self.output_sequence = 0;
    }

    fn take_group(&mut self) -> Option<MergedGroup> {
        if self.ids.is_empty() {
            return None;
        }
        let group = MergedGroup {
            tokens: self.tokens,
            fragment_ids: std::mem::take(&mut self.ids),
            contents: std::mem::take(&mut self.contents),
            sequence_index: self.output_sequence,
            document_id: self.document_id.expect("non-empty accumulation has a document"),
            last_source: std::mem::take(&mut self.last_source),
        };
        self.tokens = 0;
        self.output_sequence += 1;
        Some(group)
    }
}
