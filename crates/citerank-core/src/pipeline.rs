//! Multi-source citation pipeline.
//!
//! Runs fusion, expansion and snippet assembly for every data source of a
//! request. Sources are independent and processed concurrently; a failing
//! source is reported next to the successful ones instead of failing the
//! request.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RankingConfig;
use crate::errors::RankError;
use crate::expand::{expand, ExpansionOutcome};
use crate::fusion::{fuse, HitCounts};
use crate::reranker::RerankerBackend;
use crate::slice_fetch::NextSliceFetcher;
use crate::snippet::SnippetAssembler;
use crate::types::{CandidateSlice, Citation, QueryInput};

// ============================================================================
// Request
// ============================================================================

/// Dense and sparse hits of one query variant for one data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourcePools {
    #[serde(default)]
    pub dense: Vec<CandidateSlice>,
    #[serde(default)]
    pub sparse: Vec<CandidateSlice>,
}

impl DataSourcePools {
    /// Append another variant's hits after this one's.
    pub fn extend_from(&mut self, other: DataSourcePools) {
        self.dense.extend(other.dense);
        self.sparse.extend(other.sparse);
    }

    /// Concatenate the hits of several query variants, in order.
    pub fn merge_variants(variants: Vec<DataSourcePools>) -> Self {
        let mut merged = Self::default();
        for variant in variants {
            merged.extend_from(variant);
        }
        merged
    }
}

/// Input of one ranking run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankRequest {
    pub query: QueryInput,

    /// Hits per data source; each source holds one entry per query variant.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Vec<DataSourcePools>>,

    /// Document the caller is scoped to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoped_doc_id: Option<String>,
}

// ============================================================================
// Output
// ============================================================================

/// Result for one data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub data_source: String,
    pub fused_rows: usize,
    pub hit_counts: HitCounts,
    pub expanded_rows: usize,
    pub expansion: ExpansionOutcome,
    pub citations: Vec<Citation>,
}

/// A data source that could not be ranked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceFailure {
    pub data_source: String,
    pub error: String,
}

/// Output of a ranking run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub reports: Vec<SourceReport>,
    pub failures: Vec<SourceFailure>,
}

impl PipelineOutput {
    /// Citations of all successful sources, in source order.
    pub fn citations(&self) -> impl Iterator<Item = &Citation> {
        self.reports.iter().flat_map(|r| r.citations.iter())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Wires configuration and collaborators for ranking runs.
pub struct CitationPipeline<'a> {
    config: RankingConfig,
    reranker: &'a dyn RerankerBackend,
    fetcher: &'a dyn NextSliceFetcher,
}

impl<'a> CitationPipeline<'a> {
    pub fn new(
        config: RankingConfig,
        reranker: &'a dyn RerankerBackend,
        fetcher: &'a dyn NextSliceFetcher,
    ) -> Self {
        Self {
            config,
            reranker,
            fetcher,
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Rank every data source of `request`.
    pub async fn run(&self, request: RankRequest) -> PipelineOutput {
        let start = Instant::now();
        let query = request.query.effective().to_string();
        let scoped = request.scoped_doc_id.clone();

        let tasks = request.data_sources.into_iter().map(|(name, variants)| {
            let query = query.as_str();
            let scoped = scoped.clone();
            async move {
                let pools = DataSourcePools::merge_variants(variants);
                let result = self.process_source(&name, query, pools, scoped).await;
                (name, result)
            }
        });
        let results = futures::future::join_all(tasks).await;

        let mut output = PipelineOutput::default();
        for (name, result) in results {
            match result {
                Ok(report) => output.reports.push(report),
                Err(e) => {
                    warn!("Data source '{}' failed: {}", name, e);
                    output.failures.push(SourceFailure {
                        data_source: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "pipeline: {} sources ranked, {} failed, {} citations in {:?}",
            output.reports.len(),
            output.failures.len(),
            output.citations().count(),
            start.elapsed()
        );
        output
    }

    /// Fuse, expand and assemble one data source.
    pub async fn process_source(
        &self,
        name: &str,
        query: &str,
        pools: DataSourcePools,
        scoped_doc_id: Option<String>,
    ) -> Result<SourceReport, RankError> {
        debug!(
            "source '{}': {} dense, {} sparse candidates",
            name,
            pools.dense.len(),
            pools.sparse.len()
        );

        let table = fuse(
            query,
            pools.dense,
            pools.sparse,
            &self.config.fusion,
            self.reranker,
        )
        .await?;
        let fused_rows = table.len();
        let hit_counts = table.hit_counts;

        let expansion = expand(table.rows, &self.config.expansion, self.fetcher).await;
        let expanded_rows = expansion.rows.len();

        let citations = SnippetAssembler::new(self.config.citation.max_slice_per_cite)
            .with_scoped_doc_id(scoped_doc_id)
            .assemble(&expansion.rows);

        Ok(SourceReport {
            data_source: name.to_string(),
            fused_rows,
            hit_counts,
            expanded_rows,
            expansion: expansion.outcome,
            citations,
        })
    }
}
