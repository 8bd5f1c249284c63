//! Error types for citerank-model.
//!
//! Every variant names the service that failed so the caller can tell a
//! rerank outage from a slice-fetch outage without parsing messages.

use thiserror::Error;

/// Result type alias for citerank-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while talking to the external ranking services.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Transport errors
    // ========================================================================
    /// The HTTP request could not be sent or the connection failed.
    #[error("Request to {service} at {url} failed: {message}")]
    RequestFailed {
        service: &'static str,
        url: String,
        message: String,
    },

    /// The service answered with a non-success status code.
    #[error("{service} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        body: String,
    },

    // ========================================================================
    // Payload errors
    // ========================================================================
    /// The response body did not have the expected shape.
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    /// The rerank service returned a different number of scores than documents sent.
    #[error("Reranking failed for model '{model_id}': expected {expected} scores, got {actual}")]
    LengthMismatch {
        model_id: String,
        expected: usize,
        actual: usize,
    },

    // ========================================================================
    // Configuration errors
    // ========================================================================
    /// Client configuration is unusable (empty URL, no index, ...).
    #[error("Invalid service configuration: {message}")]
    InvalidConfig { message: String },

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error constructors
// ============================================================================

impl ModelError {
    /// Create a request failed error.
    pub fn request_failed(
        service: &'static str,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RequestFailed {
            service,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(service: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
