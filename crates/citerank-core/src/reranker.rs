//! Cross-encoder reranking seam.
//!
//! Fusion and FAQ ranking score `(query, text)` pairs through the
//! [`RerankerBackend`] trait. The production backend is
//! [`HttpRerankerBackend`](crate::model_adapter::HttpRerankerBackend), a thin
//! wrapper around `citerank_model::HttpRerankClient`; tests plug in
//! word-overlap doubles.

use async_trait::async_trait;

use crate::errors::RankError;

// ============================================================================
// RerankerBackend Trait
// ============================================================================

/// Trait for reranker backends.
///
/// Implementations return one relevance score per document, in input order.
#[async_trait]
pub trait RerankerBackend: Send + Sync {
    /// Get the model ID this backend uses.
    fn model_id(&self) -> &str;

    /// Score a batch of documents against a query.
    ///
    /// Must return exactly `documents.len()` scores.
    async fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, RankError>;
}

/// Score `documents`, skipping the call for an empty batch and checking the
/// returned length.
pub async fn score_checked(
    reranker: &dyn RerankerBackend,
    query: &str,
    documents: &[String],
) -> Result<Vec<f32>, RankError> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }
    let scores = reranker.score_batch(query, documents).await?;
    if scores.len() != documents.len() {
        return Err(RankError::RerankerFailed {
            model_id: reranker.model_id().to_string(),
            reason: format!(
                "expected {} scores, got {}",
                documents.len(),
                scores.len()
            ),
        });
    }
    Ok(scores)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Mock reranker that scores by word overlap with the query.
    pub(crate) struct MockRerankerBackend;

    #[async_trait]
    impl RerankerBackend for MockRerankerBackend {
        fn model_id(&self) -> &str {
            "mock-reranker"
        }

        async fn score_batch(
            &self,
            query: &str,
            documents: &[String],
        ) -> Result<Vec<f32>, RankError> {
            let query_lower = query.to_lowercase();
            let query_words: Vec<&str> = query_lower.split_whitespace().collect();
            Ok(documents
                .iter()
                .map(|doc| {
                    let doc_lower = doc.to_lowercase();
                    query_words
                        .iter()
                        .filter(|w| doc_lower.contains(*w))
                        .count() as f32
                })
                .collect())
        }
    }

    /// Reranker that always fails.
    pub(crate) struct FailingRerankerBackend;

    #[async_trait]
    impl RerankerBackend for FailingRerankerBackend {
        fn model_id(&self) -> &str {
            "failing"
        }

        async fn score_batch(&self, _: &str, _: &[String]) -> Result<Vec<f32>, RankError> {
            Err(RankError::RerankerUnavailable {
                provider: "failing".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    /// Reranker that drops the last score.
    struct ShortRerankerBackend;

    #[async_trait]
    impl RerankerBackend for ShortRerankerBackend {
        fn model_id(&self) -> &str {
            "short"
        }

        async fn score_batch(&self, _: &str, docs: &[String]) -> Result<Vec<f32>, RankError> {
            Ok(vec![0.0; docs.len().saturating_sub(1)])
        }
    }

    #[tokio::test]
    async fn test_mock_reranker_scores_by_overlap() {
        let docs = vec![
            "nothing relevant".to_string(),
            "rust async runtime".to_string(),
            "rust only".to_string(),
        ];
        let scores = score_checked(&MockRerankerBackend, "rust async", &docs)
            .await
            .unwrap();
        assert_eq!(scores, vec![0.0, 2.0, 1.0]);
    }

    #[tokio::test]
    async fn test_score_checked_skips_empty_batch() {
        // The failing backend is never called for an empty batch.
        let scores = score_checked(&FailingRerankerBackend, "q", &[]).await.unwrap();
        assert!(scores.is_empty());
    }

    #[tokio::test]
    async fn test_score_checked_rejects_short_answer() {
        let docs = vec!["a".to_string(), "b".to_string()];
        let err = score_checked(&ShortRerankerBackend, "q", &docs)
            .await
            .unwrap_err();
        assert!(matches!(err, RankError::RerankerFailed { .. }));
    }
}
