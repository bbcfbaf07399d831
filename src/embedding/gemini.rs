//! Gemini embedding API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::types::PipelineError;

/// Dimensionality the vector index is provisioned for by default.
pub const DEFAULT_DIMENSIONS: usize = 512;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "text-embedding-004";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`GeminiEmbedder`].
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    /// Per-request timeout applied to every embedding call.
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// HTTP embedding provider backed by the Gemini `embedContent` endpoint.
///
/// Failures are classified for the retry layer: HTTP 429 and 5xx become
/// [`PipelineError::EmbeddingTransient`], other non-2xx statuses become
/// [`PipelineError::EmbeddingRejected`], and transport errors surface as
/// retryable fetch failures.
#[derive(Clone, Debug)]
pub struct GeminiEmbedder {
    client: Client,
    config: GeminiConfig,
}

impl GeminiEmbedder {
    pub fn new(config: GeminiConfig) -> Result<Self, PipelineError> {
        if config.api_key.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "missing Gemini API key".into(),
            ));
        }
        if config.dimensions == 0 {
            return Err(PipelineError::Configuration(
                "embedding dimensionality must be non-zero".into(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| PipelineError::Configuration(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:embedContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let request = EmbedContentRequest {
            model: format!("models/{}", self.config.model),
            content: Content {
                parts: vec![Part { text }],
            },
            output_dimensionality: Some(self.config.dimensions),
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::EmbeddingRejected(format!("malformed response: {err}")))?;
        Ok(parsed.embedding.values)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}

fn classify_status(status: StatusCode, body: String) -> PipelineError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PipelineError::EmbeddingTransient(format!("{status}: {body}"))
    } else {
        PipelineError::EmbeddingRejected(format!("{status}: {body}"))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn embedder_for(server: &MockServer, dimensions: usize) -> GeminiEmbedder {
        let config = GeminiConfig::new("test-key")
            .with_base_url(server.base_url())
            .with_dimensions(dimensions);
        GeminiEmbedder::new(config).unwrap()
    }

    #[tokio::test]
    async fn embeds_over_http_and_parses_the_vector() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/text-embedding-004:embedContent")
                    .query_param("key", "test-key")
                    .json_body_partial(
                        r#"{"model": "models/text-embedding-004", "outputDimensionality": 3}"#,
                    );
                then.status(200).json_body(serde_json::json!({
                    "embedding": { "values": [0.1, 0.2, 0.3] }
                }));
            })
            .await;

        let embedder = embedder_for(&server, 3);
        let vector = embedder.embed("quarterly revenue").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_429_surfaces_as_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).body("quota exhausted");
            })
            .await;

        let err = embedder_for(&server, 3).embed("text").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, PipelineError::EmbeddingTransient(_)));
    }

    #[tokio::test]
    async fn malformed_response_body_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).body("not json");
            })
            .await;

        let err = embedder_for(&server, 3).embed("text").await.unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingRejected(_)));
    }

    #[test]
    fn rejects_blank_api_key() {
        let err = GeminiEmbedder::new(GeminiConfig::new("  ")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn status_classification_matches_taxonomy() {
        assert!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_retryable()
        );
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_retryable());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, String::new()).is_retryable());
        assert!(!classify_status(StatusCode::BAD_REQUEST, String::new()).is_retryable());
    }
}
