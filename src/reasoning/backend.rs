//! HTTP client for the text-generation backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{BackendConfig, RequestConfig};
use crate::error::{BackendResult, ReasoningError};

/// Text-generation capability.
///
/// The production implementation is [`OllamaClient`]; tests substitute
/// their own.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for the prompt.
    async fn generate(&self, prompt: &str) -> BackendResult<String>;
}

/// Request body for the generate endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    /// Always `false`: responses are consumed as one blocking body.
    pub stream: bool,
    pub options: GenerateOptions,
}

/// Sampling options forwarded to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// Response body from the generate endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// Free text expected (but not guaranteed) to contain the requested
    /// JSON shape.
    pub response: String,
}

/// Client for an Ollama-style generation API.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    backend_config: BackendConfig,
    request_config: RequestConfig,
}

impl OllamaClient {
    /// Create a new client.
    ///
    /// The HTTP timeout is the hard per-call ceiling; it is reported as a
    /// dedicated timeout error, never conflated with cancellation.
    pub fn new(config: &BackendConfig, request_config: RequestConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ReasoningError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            backend_config: config.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute_request(&self, url: &str, request: &GenerateRequest) -> BackendResult<String> {
        debug!(
            model = %request.model,
            prompt_chars = request.prompt.len(),
            "calling generation backend"
        );

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReasoningError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    ReasoningError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| ReasoningError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(body.response)
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    async fn generate(&self, prompt: &str) -> BackendResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: self.backend_config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.backend_config.temperature,
                max_output_tokens: self.backend_config.max_output_tokens,
            },
        };

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "retrying generation request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(response) => {
                    let latency = start.elapsed();
                    info!(
                        latency_ms = latency.as_millis(),
                        response_chars = response.len(),
                        "generation call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    let latency = start.elapsed();
                    error!(
                        error = %e,
                        latency_ms = latency.as_millis(),
                        retry = retries,
                        "generation call failed"
                    );
                    // A hard timeout already consumed the whole budget;
                    // retrying would blow past the 5-minute ceiling.
                    if e.is_timeout() {
                        return Err(e);
                    }
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(ReasoningError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }
}
