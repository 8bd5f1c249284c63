//! Error types for citerank-core.

use thiserror::Error;

/// Domain-specific errors for ranking operations.
#[derive(Error, Debug)]
pub enum RankError {
    /// A configuration value is invalid.
    ///
    /// Used for validation errors detected when loading or overriding config
    /// (e.g., rerankTopk=0).
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// Configuration file could not be read or parsed.
    #[error("Config invalid: {0}")]
    InvalidConfig(String),

    /// The reranker service could not be reached or rejected the request.
    #[error("Reranker '{provider}' unavailable: {reason}")]
    RerankerUnavailable {
        /// Provider or model name.
        provider: String,
        /// Underlying failure.
        reason: String,
    },

    /// The reranker answered but the answer is unusable.
    #[error("Reranker inference failed for model '{model_id}': {reason}")]
    RerankerFailed {
        /// Model that produced the bad answer.
        model_id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The neighbour-slice service failed.
    ///
    /// Expansion absorbs this error; it only surfaces when the fetcher is
    /// called directly.
    #[error("Slice fetch failed: {reason}")]
    SliceFetchFailed {
        /// Underlying failure.
        reason: String,
    },

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Normalization cannot produce a finite value for this column.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum NormalizeError {
    /// Zero spread (`std == 0` or `max == min`) or a non-finite statistic.
    #[error("degenerate score distribution (spread {spread})")]
    DegenerateDistribution {
        /// The offending denominator.
        spread: f64,
    },
}
