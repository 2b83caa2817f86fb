//! Provenance tagging from connector labels.
//!
//! Maps a row's source connector label to the subgraph tags its content
//! belongs to. The mapping is an immutable value injected at
//! construction; unknown labels are not an error, they just get the
//! catch-all tag.

use std::collections::BTreeMap;

/// Appended to every tag set, known label or not.
pub const CATCH_ALL_TAG: &str = "ALL";

/// Static connector-label to subgraph-tag lookup.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceTagger {
    sources: BTreeMap<String, Vec<String>>,
}

impl ProvenanceTagger {
    pub fn new(sources: BTreeMap<String, Vec<String>>) -> Self {
        Self { sources }
    }

    /// Tags for a source label, always ending with [`CATCH_ALL_TAG`].
    ///
    /// Never empty and never fails: an unrecognized label yields just
    /// the catch-all tag.
    pub fn tag(&self, source_label: &str) -> Vec<String> {
        let mut tags = self
            .sources
            .get(source_label)
            .cloned()
            .unwrap_or_default();
        tags.push(CATCH_ALL_TAG.to_string());
        tags
    }
}
