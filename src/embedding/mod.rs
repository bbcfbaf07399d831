//! Text-to-vector embedding providers.
//!
//! The [`EmbeddingProvider`] trait is the seam between the pipeline and
//! whatever service produces vectors. Two implementations ship here:
//!
//! * [`GeminiEmbedder`] — HTTP client for the Gemini embedding API.
//! * [`MockEmbeddingProvider`] — deterministic, offline vectors for tests.
//!
//! Retry and backoff live in [`retry`] as a composable policy applied at the
//! call site rather than baked into any provider.

pub mod gemini;
pub mod retry;

use async_trait::async_trait;

use crate::types::PipelineError;

pub use gemini::{GeminiConfig, GeminiEmbedder};
pub use retry::{RetryPolicy, RetryingEmbedder};

/// Converts text into a fixed-length embedding vector.
///
/// Implementations report their dimensionality up front so callers can
/// provision the vector index and validate every returned vector against it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text into a vector of [`dimensions`](Self::dimensions)
    /// floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;

    /// The fixed output dimensionality of this provider.
    fn dimensions(&self) -> usize;
}

#[async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for &T {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        (**self).embed(text).await
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }
}

#[async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for std::sync::Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        (**self).embed(text).await
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }
}

/// Deterministic offline embedding provider for tests and dry runs.
///
/// Identical text always yields an identical unit-length vector, and
/// different texts almost always differ, which is enough to exercise
/// similarity search end to end without a network dependency.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // FNV-1a over the text seeds a cheap xorshift stream; stable across
        // runs and platforms.
        let mut state = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(0x1000_0000_01b3)
            })
            .max(1);

        let mut raw = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            raw.push(((state >> 11) as f32 / (1u64 << 53) as f32) - 0.5);
        }

        let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut raw {
                *value /= norm;
            }
        }
        raw
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(gemini::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
