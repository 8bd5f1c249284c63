//! HTTP client for the cross-encoder rerank service.
//!
//! The service takes one query and a list of documents and answers with
//! `{"results": [{"index", "relevance_score"}]}` in relevance order. The client
//! puts the scores back in input order so callers can zip them with their rows.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RerankServiceConfig;
use crate::error::{ModelError, ModelResult};

const SERVICE: &str = "rerank";

#[derive(Debug, Serialize)]
pub(crate) struct RerankRequest<'a> {
    pub model: &'a str,
    pub query: &'a str,
    pub documents: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct RerankResponse {
    pub results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RerankResult {
    pub index: usize,
    pub relevance_score: f32,
}

/// Async client for the rerank endpoint.
#[derive(Debug, Clone)]
pub struct HttpRerankClient {
    client: reqwest::Client,
    config: RerankServiceConfig,
}

impl HttpRerankClient {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if the config is unusable or the
    /// underlying HTTP client cannot be built.
    pub fn new(config: RerankServiceConfig) -> ModelResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::invalid_config(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Model name sent to the service.
    pub fn model_id(&self) -> &str {
        &self.config.model
    }

    /// Score every document against the query, returning scores in input order.
    ///
    /// An empty document list returns an empty vector without a network call.
    pub async fn rerank(&self, query: &str, documents: &[String]) -> ModelResult<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.build_request(query, documents).map_err(|e| {
            ModelError::request_failed(SERVICE, &self.config.url, e.to_string())
        })?;

        debug!(
            "rerank request: {} documents to {}",
            documents.len(),
            self.config.url
        );

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ModelError::request_failed(SERVICE, &self.config.url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ModelError::request_failed(SERVICE, &self.config.url, e.to_string()))?;
        let parsed: RerankResponse = serde_json::from_str(&text)?;

        scores_in_input_order(&self.config.model, parsed, documents.len())
    }

    /// Build the POST request: JSON body plus the optional account headers.
    pub(crate) fn build_request(
        &self,
        query: &str,
        documents: &[String],
    ) -> reqwest::Result<reqwest::Request> {
        let body = RerankRequest {
            model: &self.config.model,
            query,
            documents,
        };

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(account_id) = &self.config.account_id {
            request = request.header("x-account-id", account_id);
        }
        if let Some(account_type) = &self.config.account_type {
            request = request.header("x-account-type", account_type);
        }
        request.build()
    }
}

/// Place `relevance_score`s at their `index` and check every slot was filled.
pub(crate) fn scores_in_input_order(
    model_id: &str,
    response: RerankResponse,
    expected: usize,
) -> ModelResult<Vec<f32>> {
    if response.results.len() != expected {
        return Err(ModelError::LengthMismatch {
            model_id: model_id.to_string(),
            expected,
            actual: response.results.len(),
        });
    }

    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for result in response.results {
        let slot = scores.get_mut(result.index).ok_or_else(|| {
            ModelError::invalid_response(
                SERVICE,
                format!("index {} out of range for {} documents", result.index, expected),
            )
        })?;
        if slot.is_some() {
            return Err(ModelError::invalid_response(
                SERVICE,
                format!("index {} returned twice", result.index),
            ));
        }
        *slot = Some(result.relevance_score);
    }

    // Lengths match and no index repeats, so every slot is filled.
    Ok(scores.into_iter().map(|s| s.unwrap_or(f32::MIN)).collect())
}
