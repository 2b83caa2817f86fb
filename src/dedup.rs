//! Fragment-id disambiguation for one fetch window.
//!
//! The store may emit multiple candidate versions of overlapping
//! fragments (re-chunkings). Each fragment id is composite,
//! `<prefix>-<suffix>`, where the suffix names a disambiguation
//! partition. The partition whose suffix occurs least often in the
//! window is treated as the authoritative version.
//!
//! In corpus mode this runs per fetched page, so the heuristic's scope
//! follows pagination boundaries rather than documents. Kept that way
//! for compatibility with the existing store contents; see DESIGN.md.

use std::collections::HashMap;

/// Indices of the fragments whose id suffix has the minimum occurrence
/// frequency in `ids`.
///
/// The suffix is the second `-`-delimited token of the id; ids without a
/// separator count their whole id as the suffix. Ties between equally
/// rare suffixes go to whichever suffix was seen first in the window,
/// so the selection is deterministic given input order.
///
/// Pure, O(n) time, O(distinct suffixes) space.
pub fn unique_fragment_indices(ids: &[&str]) -> Vec<usize> {
    if ids.is_empty() {
        return Vec::new();
    }

    let suffixes: Vec<&str> = ids.iter().map(|id| suffix_of(id)).collect();

    let mut freq: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for &s in &suffixes {
        let count = freq.entry(s).or_insert(0);
        if *count == 0 {
            order.push(s);
        }
        *count += 1;
    }

    // Strict less-than keeps the first-seen suffix on ties.
    let mut min_suffix = order[0];
    for &s in &order[1..] {
        if freq[s] < freq[min_suffix] {
            min_suffix = s;
        }
    }

    suffixes
        .iter()
        .enumerate()
        .filter(|&(_, &s)| s == min_suffix)
        .map(|(i, _)| i)
        .collect()
}

fn suffix_of(id: &str) -> &str {
    id.split('-').nth(1).unwrap_or(id)
}
