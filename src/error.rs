//! Pipeline error taxonomy.
//!
//! Three failure classes cross the pipeline boundary. Everything else is
//! either total (the aggregator) or handled where it occurs.

use thiserror::Error;

/// Errors surfaced by the aggregation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The store connection could not be established, a query failed, or
    /// a store call timed out. A run that hits this returns whatever was
    /// already flushed, alongside the error.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// Rejected at construction; a pipeline with invalid configuration
    /// never starts a stream.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// The tokenizer collaborator misbehaved. Fatal for the document
    /// being aggregated, harmless to sibling documents.
    #[error("tokenization failed: {reason}")]
    Tokenization { reason: String },
}

impl PipelineError {
    pub fn store(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn tokenization(reason: impl Into<String>) -> Self {
        Self::Tokenization {
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::store(e.to_string())
    }
}
