//! Token counting behind a trait seam.
//!
//! The aggregator trusts exactly one numeric quantity for its threshold
//! decisions: the count returned here. The production implementation
//! wraps tiktoken's `cl100k_base` encoding; tests substitute their own
//! deterministic counters.

use tiktoken_rs::CoreBPE;

use crate::error::PipelineError;

/// Deterministic text-to-token-count function.
///
/// Implementations must never fail for well-formed UTF-8; the error path
/// exists for non-conformant collaborators and is treated as fatal for
/// the document being aggregated.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, PipelineError>;
}

/// [`TokenCounter`] backed by tiktoken's `cl100k_base` BPE.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Load the bundled `cl100k_base` encoding.
    pub fn new() -> Result<Self, PipelineError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| PipelineError::tokenization(format!("failed to load cl100k_base: {e}")))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> Result<usize, PipelineError> {
        Ok(self.bpe.encode_ordinary(text).len())
    }
}
