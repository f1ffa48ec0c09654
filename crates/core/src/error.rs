//! Error types for the Forager domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

use crate::observation::ToolErrorCause;

// --- Bounded context errors ---

/// Failures of the completion service.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether retrying the same request can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_)
            | Self::ModelNotFound(_)
            | Self::NotConfigured(_)
            | Self::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Failures reported by a tool capability or by the dispatcher around it.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool transport failure: {tool_name} — {reason}")]
    Transport { tool_name: String, reason: String },

    #[error("Tool rejected the request: {tool_name} — {reason}")]
    Rejected { tool_name: String, reason: String },
}

impl ToolError {
    /// Map this error onto the self-correction taxonomy.
    pub fn cause(&self) -> ToolErrorCause {
        match self {
            Self::Unavailable(_) => ToolErrorCause::Unavailable,
            Self::InvalidArguments(_) => ToolErrorCause::InvalidParameters,
            Self::Timeout { .. } => ToolErrorCause::Timeout,
            Self::Transport { .. } => ToolErrorCause::Transport,
            Self::Rejected { .. } => ToolErrorCause::Rejected,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.cause().is_retryable()
    }
}
