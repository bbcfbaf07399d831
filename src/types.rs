//! Shared types and the crate-wide error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A source document ready for chunking and embedding.
///
/// Produced by the loader (one per file) or the crawler (one per crawled
/// seed). The `id` doubles as the citation label stored alongside every
/// chunk, so it should be a filename or URL the reader can recognize.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Unique identifier within a batch (filename or URL-derived).
    pub id: String,
    /// Full extracted text.
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Errors surfaced by the ingestion and retrieval pipeline.
///
/// Variants map onto four handling classes: transient service errors are
/// retried with backoff, validation errors fail their unit of work
/// immediately, configuration errors abort before any I/O, and network
/// errors are branch failures in the crawler but retryable in the
/// embedding path. [`PipelineError::is_retryable`] encodes that split.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rate limit or 5xx from the embedding service; safe to retry.
    #[error("embedding service unavailable: {0}")]
    EmbeddingTransient(String),

    /// Authentication or request validation failure; retrying cannot help.
    #[error("embedding request rejected: {0}")]
    EmbeddingRejected(String),

    /// The embedding call succeeded but returned the wrong vector length.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector store operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Fatal setup problem (missing index, provisioning mismatch, bad path).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A URL could not be parsed or lacks a scheme/host.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP fetch failure (connect error, timeout, non-2xx status).
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A unit of work carried no usable content.
    #[error("empty content: {0}")]
    EmptyContent(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether a retry with backoff has any chance of succeeding.
    ///
    /// Network failures count as retryable here because this classification
    /// is consulted on the embedding path; the crawler handles its own fetch
    /// failures as branch terminations instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::EmbeddingTransient(_) | PipelineError::Fetch(_)
        )
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Fetch(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(PipelineError::EmbeddingTransient("429".into()).is_retryable());
        assert!(PipelineError::Fetch("timeout".into()).is_retryable());
        assert!(!PipelineError::EmbeddingRejected("bad key".into()).is_retryable());
        assert!(
            !PipelineError::DimensionMismatch {
                expected: 512,
                actual: 768
            }
            .is_retryable()
        );
        assert!(!PipelineError::Configuration("missing index".into()).is_retryable());
    }
}
