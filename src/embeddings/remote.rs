//! Remote embedding service over an OpenAI-compatible HTTP API
//!
//! Calls a `/embeddings` endpoint with retry and exponential backoff for
//! rate limits and transient network failures.

use crate::config::EmbeddingConfig;
use crate::embeddings::EmbeddingService;
use crate::error::{Result, SqlSageError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Maximum texts per batch request
const MAX_BATCH_SIZE: usize = 128;

/// Maximum retry attempts for rate limiting and transient failures
const MAX_RETRIES: usize = 3;

/// Backoff base duration in milliseconds
const BACKOFF_BASE_MS: u64 = 1000;

/// Request timeout duration
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remote HTTP embedding service
pub struct RemoteEmbeddingService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

/// Embedding API request structure
#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
}

/// Embedding API response structure
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// API error response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl RemoteEmbeddingService {
    /// Create a new remote embedding service
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        dimensions: usize,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(SqlSageError::Config(config::ConfigError::Message(
                "Embedding API key cannot be empty".to_string(),
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url,
            dimensions,
        })
    }

    /// Build the service from engine configuration
    ///
    /// The API key is read from the environment variable named in
    /// `embedding.api_key_env`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;

        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            SqlSageError::Config(config::ConfigError::Message(format!(
                "Embedding API key not set; export {}",
                config.api_key_env
            )))
        })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Self::new(api_key, config.model.clone(), base_url, config.dimensions)
    }

    /// Call the embedding API with retry and exponential backoff
    async fn call_api_with_retry(&self, texts: &[String]) -> Result<EmbeddingResponse> {
        let mut retries = 0;

        loop {
            match self.call_api(texts).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if retries >= MAX_RETRIES {
                        return Err(e);
                    }

                    let should_retry = match &e {
                        SqlSageError::DependencyUnavailable(_) => true,
                        SqlSageError::Http(err) => err.is_timeout() || err.is_connect(),
                        _ => false,
                    };

                    if !should_retry {
                        return Err(e);
                    }

                    let backoff_ms = BACKOFF_BASE_MS * 2_u64.pow(retries as u32);
                    warn!(
                        "Embedding API call failed, retrying after {}ms (attempt {}/{})",
                        backoff_ms,
                        retries + 1,
                        MAX_RETRIES
                    );

                    sleep(Duration::from_millis(backoff_ms)).await;
                    retries += 1;
                }
            }
        }
    }

    /// Call the embedding API once (no retry)
    async fn call_api(&self, texts: &[String]) -> Result<EmbeddingResponse> {
        debug!(
            "Calling embedding API: {} texts, model: {}",
            texts.len(),
            self.model
        );

        let request = EmbeddingRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        match status {
            StatusCode::OK => {
                let parsed = response.json::<EmbeddingResponse>().await?;
                debug!("Generated {} embeddings", parsed.data.len());
                Ok(parsed)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SqlSageError::Config(config::ConfigError::Message(
                    "Invalid or missing embedding API key".to_string(),
                )))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(SqlSageError::DependencyUnavailable(
                "Embedding API rate limit exceeded".to_string(),
            )),
            StatusCode::BAD_REQUEST => {
                let error_msg = if let Ok(error_response) = response.json::<ErrorResponse>().await {
                    error_response
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "Bad request".to_string())
                } else {
                    "Bad request".to_string()
                };

                Err(SqlSageError::Embedding(error_msg))
            }
            _ => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());

                Err(SqlSageError::DependencyUnavailable(format!(
                    "Embedding API error (status {}): {}",
                    status, error_text
                )))
            }
        }
    }

    /// Validate embedding dimensions and values
    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(SqlSageError::Embedding(format!(
                "Expected {} dimensions, got {}",
                self.dimensions,
                embedding.len()
            )));
        }

        if embedding.iter().any(|&x| !x.is_finite()) {
            return Err(SqlSageError::Embedding(
                "Embedding contains invalid values (NaN or Inf)".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl EmbeddingService for RemoteEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(SqlSageError::Validation(
                "Text cannot be empty".to_string(),
            ));
        }

        let texts = vec![text.to_string()];
        let response = self.call_api_with_retry(&texts).await?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| SqlSageError::Embedding("Empty response from API".to_string()))?
            .embedding;

        self.validate_embedding(&embedding)?;

        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            let owned: Vec<String> = chunk.iter().map(|s| s.to_string()).collect();
            let response = self.call_api_with_retry(&owned).await?;

            if response.data.len() != chunk.len() {
                return Err(SqlSageError::Embedding(format!(
                    "API returned {} embeddings for {} texts",
                    response.data.len(),
                    chunk.len()
                )));
            }

            for data in response.data {
                self.validate_embedding(&data.embedding)?;
                all_embeddings.push(data.embedding);
            }
        }

        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> RemoteEmbeddingService {
        RemoteEmbeddingService::new(
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            "http://localhost:9999".to_string(),
            4,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = RemoteEmbeddingService::new(
            String::new(),
            "m".to_string(),
            "http://localhost".to_string(),
            4,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_embedding_dimensions() {
        let svc = service();
        assert!(svc.validate_embedding(&[0.1, 0.2, 0.3, 0.4]).is_ok());
        assert!(svc.validate_embedding(&[0.1, 0.2]).is_err());
    }

    #[test]
    fn test_validate_embedding_rejects_nan() {
        let svc = service();
        assert!(svc.validate_embedding(&[0.1, f32::NAN, 0.3, 0.4]).is_err());
        assert!(svc
            .validate_embedding(&[0.1, f32::INFINITY, 0.3, 0.4])
            .is_err());
    }
}
