//! Retry policy and the dimension-validating embedder wrapper.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::EmbeddingProvider;
use crate::types::PipelineError;

/// Exponential backoff policy for transient embedding failures.
///
/// Attempt `n` (1-based) waits `min_backoff * 2^(n-1)` before retrying,
/// capped at `max_backoff`. The defaults mirror the upstream service's
/// published rate-limit guidance: five attempts, 2s to 30s.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_backoff,
            max_backoff,
        }
    }

    /// Delay to sleep after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let doubled = self
            .min_backoff
            .checked_mul(1u32 << attempt.saturating_sub(1).min(16))
            .unwrap_or(self.max_backoff);
        doubled.min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Wraps an [`EmbeddingProvider`] with retry, backoff, and output validation.
///
/// Retryable errors (rate limits, 5xx, transport failures) are retried per
/// the policy; anything else fails immediately without consuming retry
/// budget. After a successful call the vector length is checked against the
/// provider's declared dimensionality — a mismatch is a data-integrity
/// failure surfaced as [`PipelineError::DimensionMismatch`] and never
/// retried.
#[derive(Clone, Debug)]
pub struct RetryingEmbedder<P> {
    provider: P,
    policy: RetryPolicy,
}

impl<P: EmbeddingProvider> RetryingEmbedder<P> {
    pub fn new(provider: P, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for RetryingEmbedder<P> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let expected = self.provider.dimensions();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.provider.embed(text).await {
                Ok(vector) => {
                    if vector.len() != expected {
                        return Err(PipelineError::DimensionMismatch {
                            expected,
                            actual: vector.len(),
                        });
                    }
                    return Ok(vector);
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient embedding failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    debug!(attempt, error = %err, "embedding failed permanently");
                    return Err(err);
                }
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }
}
