//! Batch ingestion: chunk, embed, upsert, with per-document failure
//! isolation.

use std::time::Duration;

use tracing::{info, warn};

use crate::chunking::chunk_text;
use crate::embedding::EmbeddingProvider;
use crate::stores::{IndexRecord, RecordMetadata, VectorStore};
use crate::types::{Document, PipelineError};

/// Tuning knobs for [`IngestionPipeline`].
#[derive(Clone, Debug)]
pub struct IngestionConfig {
    /// Maximum characters per chunk.
    pub max_chunk_chars: usize,
    /// Fixed pause between successive embed calls across the whole batch,
    /// including document boundaries, independent of the retry backoff
    /// inside the embedder. Keeps request volume under upstream rate
    /// limits.
    pub embed_pacing: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1000,
            embed_pacing: Duration::from_secs(1),
        }
    }
}

/// Summary handed back to the caller after a batch run.
#[derive(Debug, Default)]
pub struct IngestionReport {
    /// Documents whose every chunk was embedded and stored.
    pub succeeded: usize,
    /// Documents that lost at least one chunk, with what did make it in.
    pub failed: Vec<IngestionFailure>,
}

/// One document's failure entry. `chunks_stored` reports partial success —
/// chunks stored before (or after) the failure stay in the index and are
/// not rolled back.
#[derive(Debug)]
pub struct IngestionFailure {
    pub id: String,
    pub error: PipelineError,
    pub chunks_stored: usize,
}

/// Drives Document → chunks → embeddings → vector index.
pub struct IngestionPipeline<P, S> {
    embedder: P,
    store: S,
    config: IngestionConfig,
}

impl<P, S> IngestionPipeline<P, S>
where
    P: EmbeddingProvider,
    S: VectorStore,
{
    pub fn new(embedder: P, store: S, config: IngestionConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Ingests a batch. Each document is processed independently: a chunk
    /// that fails to embed or store records a failure for its document and
    /// the pipeline moves on — sibling chunks and documents are never
    /// aborted. The report is the only channel for failures; this method
    /// itself does not error.
    pub async fn ingest(&self, documents: &[Document]) -> IngestionReport {
        let mut report = IngestionReport::default();
        let mut embeds_done = 0usize;

        for document in documents {
            match self.ingest_one(document, &mut embeds_done).await {
                Ok(chunks) => {
                    info!(id = %document.id, chunks, "document ingested");
                    report.succeeded += 1;
                }
                Err((error, chunks_stored)) => {
                    warn!(id = %document.id, chunks_stored, %error, "document failed");
                    report.failed.push(IngestionFailure {
                        id: document.id.clone(),
                        error,
                        chunks_stored,
                    });
                }
            }
        }

        report
    }

    /// Returns the number of chunks stored, or the first error paired with
    /// how many chunks had already been stored when it struck.
    ///
    /// `embeds_done` counts embed calls across the batch so pacing also
    /// pauses between the last chunk of one document and the first of the
    /// next.
    async fn ingest_one(
        &self,
        document: &Document,
        embeds_done: &mut usize,
    ) -> Result<usize, (PipelineError, usize)> {
        let chunks = chunk_text(&document.content, self.config.max_chunk_chars);
        if chunks.is_empty() {
            return Err((
                PipelineError::EmptyContent(format!("document '{}' has no text", document.id)),
                0,
            ));
        }

        let mut stored = 0usize;
        let mut first_error: Option<PipelineError> = None;

        for (index, chunk) in chunks.iter().enumerate() {
            if *embeds_done > 0 && !self.config.embed_pacing.is_zero() {
                tokio::time::sleep(self.config.embed_pacing).await;
            }
            *embeds_done += 1;

            let vector = match self.embedder.embed(chunk).await {
                Ok(vector) => vector,
                Err(err) => {
                    warn!(id = %document.id, index, error = %err, "chunk embed failed");
                    first_error.get_or_insert(err);
                    continue;
                }
            };

            let record = IndexRecord::new(
                format!("{}-{}", document.id, index),
                vector,
                RecordMetadata {
                    filename: document.id.clone(),
                    text: chunk.clone(),
                },
            );

            match self.store.upsert(vec![record]).await {
                Ok(()) => stored += 1,
                Err(err) => {
                    warn!(id = %document.id, index, error = %err, "chunk upsert failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            None => Ok(stored),
            Some(error) => Err((error, stored)),
        }
    }
}
