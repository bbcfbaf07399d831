//! ```text
//! Local files ──► loader::load_directory ──┐
//!                                          ├──► Vec<Document>
//! Seed URLs ──► crawler::WebCrawler ───────┘
//!               (first financial table per seed)
//!
//! Vec<Document> ──► pipeline::IngestionPipeline
//!                       │  chunking::chunk_text
//!                       │  embedding::RetryingEmbedder<GeminiEmbedder>
//!                       ▼
//!                   stores::SqliteVectorStore
//!
//! Question ──► retrieval::RetrievalEngine ──► AnswerContext (grounded prompt)
//! ```
//!
pub mod chunking;
pub mod crawler;
pub mod embedding;
pub mod loader;
pub mod pipeline;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use crawler::{CrawlerConfig, WebCrawler};
pub use embedding::{EmbeddingProvider, GeminiConfig, GeminiEmbedder, RetryPolicy, RetryingEmbedder};
pub use pipeline::{IngestionConfig, IngestionPipeline, IngestionReport};
pub use retrieval::{AnswerContext, RetrievalEngine};
pub use stores::{IndexRecord, RecordMetadata, RetrievalMatch, SqliteVectorStore, VectorStore};
pub use types::{Document, PipelineError};
