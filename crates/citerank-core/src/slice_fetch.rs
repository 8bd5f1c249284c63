//! Neighbour-slice lookup seam used by `method7` expansion.

use async_trait::async_trait;

use crate::errors::RankError;
use crate::types::SliceRecord;

/// Fetches the slices that follow given slices inside their documents.
///
/// `doc_ids[i]` and `segment_ids[i]` form one anchor. An empty result means
/// no anchor has a successor; it is not an error.
#[async_trait]
pub trait NextSliceFetcher: Send + Sync {
    async fn fetch_next_slice(
        &self,
        doc_ids: &[String],
        segment_ids: &[i64],
    ) -> Result<Vec<SliceRecord>, RankError>;
}

/// Fetcher that never finds successors. Used when expansion is not wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSliceFetcher;

#[async_trait]
impl NextSliceFetcher for NoopSliceFetcher {
    async fn fetch_next_slice(
        &self,
        _doc_ids: &[String],
        _segment_ids: &[i64],
    ) -> Result<Vec<SliceRecord>, RankError> {
        Ok(Vec::new())
    }
}
