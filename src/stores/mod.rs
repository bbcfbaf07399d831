//! Vector index backends.
//!
//! The [`VectorStore`] trait abstracts upsert/query/delete against a
//! persistent similarity index so the pipeline and retrieval engine stay
//! backend-agnostic. One implementation ships here:
//!
//! * [`sqlite::SqliteVectorStore`] — SQLite with cosine search via
//!   `sqlite-vec`.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

pub use sqlite::SqliteVectorStore;

/// Metadata stored with every vector, sufficient to render a citation
/// without a second lookup.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Source identifier (filename or URL) of the parent document.
    pub filename: String,
    /// The chunk text itself.
    pub text: String,
}

/// A vector plus metadata, keyed for the index.
///
/// `id` is globally unique within the index — `"{documentId}-{chunkIndex}"`
/// by convention — and a later upsert with the same id supersedes the
/// earlier record entirely.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl IndexRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, metadata: RecordMetadata) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
        }
    }
}

/// One similarity match returned by a query, highest score first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalMatch {
    /// Record id of the match.
    pub id: String,
    /// Cosine similarity, higher is closer.
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Persistent nearest-neighbor index over embedding vectors.
///
/// Implementations must be safe to share across tasks; the pipeline issues
/// upserts and queries concurrently without additional locking.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or overwrites records by id. Idempotent per id.
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), PipelineError>;

    /// Returns up to `top_k` nearest records by cosine similarity, best
    /// first. Ordering is stable across repeated identical queries against
    /// an unchanged index.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, PipelineError>;

    /// Clears the entire index. Maintenance only — never called from the
    /// ingestion or retrieval hot path.
    async fn delete_all(&self) -> Result<(), PipelineError>;

    /// Number of records currently stored.
    async fn count(&self) -> Result<usize, PipelineError>;
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for &T {
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), PipelineError> {
        (**self).upsert(records).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, PipelineError> {
        (**self).query(vector, top_k).await
    }

    async fn delete_all(&self) -> Result<(), PipelineError> {
        (**self).delete_all().await
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        (**self).count().await
    }
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for std::sync::Arc<T> {
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), PipelineError> {
        (**self).upsert(records).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, PipelineError> {
        (**self).query(vector, top_k).await
    }

    async fn delete_all(&self) -> Result<(), PipelineError> {
        (**self).delete_all().await
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        (**self).count().await
    }
}
