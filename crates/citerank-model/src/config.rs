//! Configuration types for the external ranking services.
//!
//! These are plain serde structs so they can be embedded in the core
//! `RankingConfig` YAML under `services:`.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

// ============================================================================
// Defaults
// ============================================================================

/// Default rerank service endpoint.
pub const DEFAULT_RERANK_URL: &str = "http://localhost:8343/v1/rerank";

/// Default rerank model name sent in the request body.
pub const DEFAULT_RERANK_MODEL: &str = "reranker";

/// Default slice-fetch service endpoint.
pub const DEFAULT_SLICE_FETCH_URL: &str = "http://localhost:8080/api/v1/slices/neighbors";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_rerank_url() -> String {
    DEFAULT_RERANK_URL.to_string()
}

fn default_rerank_model() -> String {
    DEFAULT_RERANK_MODEL.to_string()
}

fn default_slice_fetch_url() -> String {
    DEFAULT_SLICE_FETCH_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_indexes() -> Vec<String> {
    vec![
        "anyshare_bot".to_string(),
        "anyshare_slice_vector".to_string(),
    ]
}

fn default_after_step() -> u32 {
    1
}

// ============================================================================
// RerankServiceConfig
// ============================================================================

/// Configuration of the cross-encoder rerank service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RerankServiceConfig {
    /// Full URL of the rerank endpoint.
    #[serde(default = "default_rerank_url")]
    pub url: String,

    /// Model name passed to the service.
    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional account id forwarded as `x-account-id`.
    #[serde(default)]
    pub account_id: Option<String>,

    /// Optional account type forwarded as `x-account-type`.
    #[serde(default)]
    pub account_type: Option<String>,
}

impl Default for RerankServiceConfig {
    fn default() -> Self {
        Self {
            url: default_rerank_url(),
            model: default_rerank_model(),
            timeout_secs: default_timeout_secs(),
            account_id: None,
            account_type: None,
        }
    }
}

impl RerankServiceConfig {
    /// Check that the config can be used to build a client.
    pub fn validate(&self) -> ModelResult<()> {
        if self.url.trim().is_empty() {
            return Err(ModelError::invalid_config("rerank url cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(ModelError::invalid_config("rerank timeoutSecs cannot be 0"));
        }
        Ok(())
    }
}

// ============================================================================
// SliceFetchConfig
// ============================================================================

/// Configuration of the slice-fetch index service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SliceFetchConfig {
    /// Full URL of the neighbour-slice endpoint.
    #[serde(default = "default_slice_fetch_url")]
    pub url: String,

    /// Indexes tried in order; the next one is used when the previous returns nothing.
    #[serde(default = "default_indexes")]
    pub indexes: Vec<String>,

    /// Number of preceding slices requested per anchor.
    #[serde(default)]
    pub before_step: u32,

    /// Number of following slices requested per anchor.
    #[serde(default = "default_after_step")]
    pub after_step: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SliceFetchConfig {
    fn default() -> Self {
        Self {
            url: default_slice_fetch_url(),
            indexes: default_indexes(),
            before_step: 0,
            after_step: default_after_step(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SliceFetchConfig {
    /// Check that the config can be used to build a client.
    pub fn validate(&self) -> ModelResult<()> {
        if self.url.trim().is_empty() {
            return Err(ModelError::invalid_config("slice fetch url cannot be empty"));
        }
        if self.indexes.is_empty() {
            return Err(ModelError::invalid_config(
                "slice fetch needs at least one index",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ModelError::invalid_config(
                "slice fetch timeoutSecs cannot be 0",
            ));
        }
        Ok(())
    }
}
