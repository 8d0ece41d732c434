use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// State graph construction and execution errors
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node already registered: {name}")]
    DuplicateNode { name: String },

    #[error("Unknown node: {name}")]
    UnknownNode { name: String },

    #[error("No entry edge from the start marker")]
    MissingEntryEdge,

    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

/// Evidence retrieval errors
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Log source error: {message}")]
    LogSource { message: String },

    #[error("Vector store error: {message}")]
    VectorStore { message: String },

    #[error("Embedding error: {message}")]
    Embedding { message: String },
}

/// Reasoning backend errors
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("Backend unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias for application-level operations
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result alias for retrieval operations
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Result alias for reasoning backend operations
pub type BackendResult<T> = Result<T, ReasoningError>;

impl ReasoningError {
    /// Returns `true` for the dedicated backend-timeout error.
    ///
    /// Callers use this to distinguish a backend timeout from
    /// caller-supplied cancellation, which never surfaces as an error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "OLLAMA_BASE_URL is invalid".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: OLLAMA_BASE_URL is invalid"
        );

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_graph_error_display() {
        let err = GraphError::DuplicateNode {
            name: "planner".to_string(),
        };
        assert_eq!(err.to_string(), "Node already registered: planner");

        let err = GraphError::UnknownNode {
            name: "ghost".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown node: ghost");
    }

    #[test]
    fn test_retrieval_error_display() {
        let err = RetrievalError::LogSource {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Log source error: connection refused");

        let err = RetrievalError::VectorStore {
            message: "collection missing".to_string(),
        };
        assert_eq!(err.to_string(), "Vector store error: collection missing");

        let err = RetrievalError::Embedding {
            message: "empty vector".to_string(),
        };
        assert_eq!(err.to_string(), "Embedding error: empty vector");
    }

    #[test]
    fn test_reasoning_error_display() {
        let err = ReasoningError::Unavailable {
            message: "server down".to_string(),
            retries: 3,
        };
        assert_eq!(
            err.to_string(),
            "Backend unavailable: server down (retries: 3)"
        );

        let err = ReasoningError::Api {
            status: 500,
            message: "internal".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 500 - internal");

        let err = ReasoningError::Timeout { timeout_ms: 300_000 };
        assert_eq!(err.to_string(), "Request timeout after 300000ms");
    }

    #[test]
    fn test_reasoning_error_is_timeout() {
        assert!(ReasoningError::Timeout { timeout_ms: 1 }.is_timeout());
        assert!(!ReasoningError::Unavailable {
            message: "down".to_string(),
            retries: 0,
        }
        .is_timeout());
    }

    #[test]
    fn test_error_conversion_to_app_error() {
        let graph_err = GraphError::DuplicateNode {
            name: "verifier".to_string(),
        };
        let app_err: AppError = graph_err.into();
        assert!(matches!(app_err, AppError::Graph(_)));

        let retrieval_err = RetrievalError::Embedding {
            message: "failed".to_string(),
        };
        let app_err: AppError = retrieval_err.into();
        assert!(matches!(app_err, AppError::Retrieval(_)));

        let reasoning_err = ReasoningError::Timeout { timeout_ms: 100 };
        let app_err: AppError = reasoning_err.into();
        assert!(matches!(app_err, AppError::Reasoning(_)));
    }
}
