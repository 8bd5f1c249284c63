//! Adapter layer for citerank-model services.
//!
//! Bridges the HTTP clients of `citerank-model` into the collaborator traits
//! of this crate:
//!
//! - Error conversion from `ModelError` to `RankError`
//! - [`HttpRerankerBackend`] implementing [`RerankerBackend`]
//! - [`HttpSliceFetcher`] implementing [`NextSliceFetcher`]
//!
//! ```text
//! fusion / faq / expand
//!        ↓
//!   model_adapter (this module)
//!        ↓
//!   citerank-model HTTP clients
//! ```

use async_trait::async_trait;
use citerank_model::{HttpRerankClient, HttpSliceFetchClient, ModelError, NeighborSlice};

use crate::config::ServicesConfig;
use crate::errors::RankError;
use crate::reranker::RerankerBackend;
use crate::slice_fetch::NextSliceFetcher;
use crate::types::SliceRecord;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a citerank-model error to a citerank-core error.
pub fn from_model_error(err: ModelError) -> RankError {
    match err {
        ModelError::RequestFailed {
            service,
            url,
            message,
        } => RankError::RerankerUnavailable {
            provider: service.to_string(),
            reason: format!("{url}: {message}"),
        },

        ModelError::UnexpectedStatus {
            service,
            status,
            body,
        } => RankError::RerankerUnavailable {
            provider: service.to_string(),
            reason: format!("HTTP {status}: {body}"),
        },

        ModelError::InvalidResponse { service, message } => RankError::RerankerFailed {
            model_id: service.to_string(),
            reason: message,
        },

        ModelError::LengthMismatch {
            model_id,
            expected,
            actual,
        } => RankError::RerankerFailed {
            model_id,
            reason: format!("expected {expected} scores, got {actual}"),
        },

        ModelError::InvalidConfig { message } => RankError::InvalidConfiguration {
            message,
            hint: "Check the services section of config.yaml".to_string(),
        },

        ModelError::Json(json_err) => RankError::Json(json_err),
    }
}

/// Extension trait to convert citerank-model Result to Result<T, RankError>.
pub trait IntoRankResult<T> {
    /// Convert a citerank-model result to a RankError result.
    fn into_rank_result(self) -> Result<T, RankError>;
}

impl<T> IntoRankResult<T> for Result<T, ModelError> {
    fn into_rank_result(self) -> Result<T, RankError> {
        self.map_err(from_model_error)
    }
}

// ============================================================================
// HttpRerankerBackend
// ============================================================================

/// Reranker backed by the remote rerank service.
pub struct HttpRerankerBackend {
    client: HttpRerankClient,
}

impl HttpRerankerBackend {
    pub fn new(client: HttpRerankClient) -> Self {
        Self { client }
    }

    /// Build from the services config.
    pub fn from_config(config: &ServicesConfig) -> Result<Self, RankError> {
        let client = HttpRerankClient::new(config.rerank.clone()).into_rank_result()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl RerankerBackend for HttpRerankerBackend {
    fn model_id(&self) -> &str {
        self.client.model_id()
    }

    async fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RankError> {
        self.client.rerank(query, documents).await.into_rank_result()
    }
}

// ============================================================================
// HttpSliceFetcher
// ============================================================================

/// Neighbour-slice lookup backed by the index service.
pub struct HttpSliceFetcher {
    client: HttpSliceFetchClient,
}

impl HttpSliceFetcher {
    pub fn new(client: HttpSliceFetchClient) -> Self {
        Self { client }
    }

    /// Build from the services config.
    pub fn from_config(config: &ServicesConfig) -> Result<Self, RankError> {
        let client = HttpSliceFetchClient::new(config.slice_fetch.clone()).into_rank_result()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl NextSliceFetcher for HttpSliceFetcher {
    async fn fetch_next_slice(
        &self,
        doc_ids: &[String],
        segment_ids: &[i64],
    ) -> Result<Vec<SliceRecord>, RankError> {
        let slices = self
            .client
            .fetch_next_slices(doc_ids, segment_ids)
            .await
            .map_err(|e| RankError::SliceFetchFailed {
                reason: e.to_string(),
            })?;
        Ok(slices.into_iter().map(to_slice_record).collect())
    }
}

/// Convert a wire slice into the core record type.
pub fn to_slice_record(slice: NeighborSlice) -> SliceRecord {
    SliceRecord {
        doc_id: slice.doc_id,
        segment_id: slice.segment_id,
        raw_text: slice.raw_text,
        doc_name: slice.doc_name,
        doc_md5: slice.doc_md5,
        pages: slice.pages,
        anchor_segment_id: slice.anchor_segment_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_maps_to_reranker_failed() {
        let err = from_model_error(ModelError::LengthMismatch {
            model_id: "reranker".to_string(),
            expected: 3,
            actual: 1,
        });
        match err {
            RankError::RerankerFailed { model_id, reason } => {
                assert_eq!(model_id, "reranker");
                assert!(reason.contains("expected 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transport_errors_map_to_unavailable() {
        let err = from_model_error(ModelError::request_failed(
            "rerank",
            "http://localhost:1",
            "connection refused",
        ));
        assert!(matches!(err, RankError::RerankerUnavailable { .. }));

        let err: Result<(), RankError> = Err(ModelError::UnexpectedStatus {
            service: "rerank",
            status: 503,
            body: "busy".to_string(),
        })
        .into_rank_result();
        assert!(err.unwrap_err().to_string().contains("503"));
    }

    #[test]
    fn test_invalid_config_maps_to_invalid_configuration() {
        let err = from_model_error(ModelError::invalid_config("empty url"));
        assert!(matches!(err, RankError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_backends_build_from_default_config() {
        let config = ServicesConfig::default();
        let backend = HttpRerankerBackend::from_config(&config).unwrap();
        assert_eq!(backend.model_id(), "reranker");
        assert!(HttpSliceFetcher::from_config(&config).is_ok());
    }

    #[test]
    fn test_to_slice_record() {
        let record = to_slice_record(NeighborSlice {
            doc_id: "gns://a".to_string(),
            segment_id: 5,
            raw_text: "t".to_string(),
            anchor_segment_id: 4,
            ..Default::default()
        });
        assert_eq!(record.doc_id, "gns://a");
        assert_eq!(record.segment_id, 5);
        assert_eq!(record.anchor_segment_id, 4);
    }
}
