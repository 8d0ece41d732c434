use std::env;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub retrieval: RetrievalConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// Text-generation backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// Evidence retrieval configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Vector collection holding knowledge/runbook documents.
    pub collection: String,
    /// Complexity score at or above which multi-hop retrieval is selected.
    pub complexity_threshold: f64,
    /// Whether multi-hop retrieval may be selected at all.
    pub multi_hop_enabled: bool,
    /// How many recent log entries to scan when no correlation id is given.
    pub recent_log_window: usize,
    /// Candidate limit for each vector similarity search.
    pub vector_search_limit: usize,
}

/// Investigation loop configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Iteration cap for the investigation graph.
    pub max_iterations: u32,
    /// Maximum evidence documents handed to the reasoning backend.
    pub max_evidence_docs: usize,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend = BackendConfig {
            base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: env::var("REASONING_MODEL").unwrap_or_else(|_| "llama3.1".to_string()),
            temperature: env::var("REASONING_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.2),
            max_output_tokens: env::var("REASONING_MAX_OUTPUT_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2048),
        };

        let retrieval = RetrievalConfig {
            collection: env::var("KNOWLEDGE_COLLECTION")
                .unwrap_or_else(|_| "knowledge".to_string()),
            complexity_threshold: env::var("COMPLEXITY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.6),
            multi_hop_enabled: env::var("MULTI_HOP_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            recent_log_window: env::var("RECENT_LOG_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200),
            vector_search_limit: env::var("VECTOR_SEARCH_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        };

        let agent = AgentConfig {
            max_iterations: env::var("MAX_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_evidence_docs: env::var("MAX_EVIDENCE_DOCS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300_000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        if !(0.0..=1.0).contains(&retrieval.complexity_threshold) {
            return Err(AppError::Config {
                message: "COMPLEXITY_THRESHOLD must be within [0.0, 1.0]".to_string(),
            });
        }

        if agent.max_iterations == 0 {
            return Err(AppError::Config {
                message: "MAX_ITERATIONS must be at least 1".to_string(),
            });
        }

        Ok(Self {
            backend,
            retrieval,
            agent,
            logging,
            request,
        })
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: "knowledge".to_string(),
            complexity_threshold: 0.6,
            multi_hop_enabled: true,
            recent_log_window: 200,
            vector_search_limit: 10,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_evidence_docs: 8,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            // Hard ceiling for one reasoning-backend call.
            timeout_ms: 300_000,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}
