//! Dual-channel score fusion.
//!
//! Merges a dense (embedding) pool and a sparse (BM25) pool of candidate
//! slices into one ranked table:
//!
//! 1. Each non-empty channel is cleaned (identity propagation, dedup), gets
//!    its [`ColumnStats`], and is scored by the reranker.
//! 2. Two channels are joined on slice `uuid`; rows missing from one channel
//!    get that channel's minimum as a filler. A single channel gets
//!    [`MISSING_CHANNEL_SCORE`] for the absent one.
//! 3. Channel scores are normalized and combined into `merge_score` per
//!    [`RerankerMethod`].
//! 4. Rows are stable-sorted by `merge_score` descending and deduplicated again.
//!
//! With only sparse hits and the default method the merge score is the
//! zero-score normalized BM25, while every other path uses min-max centering.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{FusionConfig, RerankerMethod};
use crate::constants::{DEGENERATE_MIN_MAX_SCORE, DEGENERATE_ZERO_SCORE, MISSING_CHANNEL_SCORE};
use crate::errors::{NormalizeError, RankError};
use crate::normalize::ColumnStats;
use crate::reranker::{score_checked, RerankerBackend};
use crate::text::title_text;
use crate::types::{CandidateSlice, DocumentIdentity, HitType, RankedSlice};

// ============================================================================
// Types
// ============================================================================

/// Number of fused rows per hit type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitCounts {
    pub all_hit: usize,
    pub only_dense: usize,
    pub only_sparse: usize,
}

impl HitCounts {
    fn from_rows(rows: &[RankedSlice]) -> Self {
        let mut counts = Self::default();
        for row in rows {
            match row.hit_type {
                Some(HitType::AllHit) => counts.all_hit += 1,
                Some(HitType::OnlyDense) => counts.only_dense += 1,
                Some(HitType::OnlySparse) => counts.only_sparse += 1,
                None => {}
            }
        }
        counts
    }
}

/// Ranked output of fusion for one data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FusedTable {
    /// Rows sorted by `merge_score` descending, unique by `(md5, text_hash)`.
    pub rows: Vec<RankedSlice>,
    pub hit_counts: HitCounts,
}

impl FusedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// One cleaned, reranked channel.
#[derive(Debug, Clone)]
pub(crate) struct Channel {
    rows: Vec<RankedSlice>,
    stats: ColumnStats,
}

// ============================================================================
// Entry point
// ============================================================================

/// Fuse a dense and a sparse pool into one ranked table.
///
/// The reranker is called once per non-empty channel; both calls run
/// concurrently. Empty pools on both sides yield an empty table.
///
/// # Errors
///
/// Returns the reranker's error if scoring either channel fails.
pub async fn fuse(
    query: &str,
    dense: Vec<CandidateSlice>,
    sparse: Vec<CandidateSlice>,
    config: &FusionConfig,
    reranker: &dyn RerankerBackend,
) -> Result<FusedTable, RankError> {
    let (dense, sparse) = futures::try_join!(
        prepare_channel(query, dense, reranker),
        prepare_channel(query, sparse, reranker),
    )?;

    let table = combine(dense, sparse, config);
    info!(
        "fusion: {} rows ({} all-hit, {} dense-only, {} sparse-only), method {}",
        table.len(),
        table.hit_counts.all_hit,
        table.hit_counts.only_dense,
        table.hit_counts.only_sparse,
        config.reranker_method
    );
    Ok(table)
}

/// Clean one channel and attach reranker scores.
pub(crate) async fn prepare_channel(
    query: &str,
    pool: Vec<CandidateSlice>,
    reranker: &dyn RerankerBackend,
) -> Result<Option<Channel>, RankError> {
    if pool.is_empty() {
        return Ok(None);
    }

    let mut rows: Vec<RankedSlice> = pool.into_iter().map(RankedSlice::from_candidate).collect();
    propagate_identity(&mut rows);
    let mut rows = dedup_rows(rows);

    let raw: Vec<f64> = rows.iter().map(|r| r.slice.score).collect();
    let Some(stats) = ColumnStats::from_scores(&raw) else {
        return Ok(None);
    };

    let texts: Vec<String> = rows
        .iter()
        .map(|r| title_text(&r.slice.document.name, &r.slice.raw_text))
        .collect();
    let scores = score_checked(reranker, query, &texts).await?;
    for (row, score) in rows.iter_mut().zip(scores) {
        row.reranker_score = Some(f64::from(score));
    }

    debug!(
        "channel prepared: {} rows, score range [{}, {}]",
        rows.len(),
        stats.min,
        stats.max
    );
    Ok(Some(Channel { rows, stats }))
}

// ============================================================================
// Combination
// ============================================================================

/// Join prepared channels and compute merge scores.
pub(crate) fn combine(
    dense: Option<Channel>,
    sparse: Option<Channel>,
    config: &FusionConfig,
) -> FusedTable {
    let mut rows = match (dense, sparse) {
        (Some(dense), Some(sparse)) => combine_both(dense, sparse, config),
        (Some(dense), None) => combine_dense_only(dense, config),
        (None, Some(sparse)) => combine_sparse_only(sparse, config),
        (None, None) => {
            debug!("fusion: both channels empty");
            return FusedTable::default();
        }
    };

    sort_by_merge_score(&mut rows);
    propagate_identity(&mut rows);
    let rows = dedup_rows(rows);
    let hit_counts = HitCounts::from_rows(&rows);
    FusedTable { rows, hit_counts }
}

fn combine_both(dense: Channel, sparse: Channel, config: &FusionConfig) -> Vec<RankedSlice> {
    let mut sparse_scores: HashMap<String, f64> = HashMap::new();
    for row in &sparse.rows {
        sparse_scores
            .entry(row.slice.uuid.clone())
            .or_insert(row.slice.score);
    }

    let mut all_hit = Vec::new();
    let mut only_dense = Vec::new();
    for mut row in dense.rows {
        row.cos_sim_score = Some(row.slice.score);
        match sparse_scores.get(&row.slice.uuid) {
            Some(&bm25) => {
                row.bm25_score = Some(bm25);
                row.hit_type = Some(HitType::AllHit);
                all_hit.push(row);
            }
            None => {
                row.bm25_score = Some(sparse.stats.min);
                row.hit_type = Some(HitType::OnlyDense);
                only_dense.push(row);
            }
        }
    }
    propagate_identity(&mut all_hit);
    let all_hit = dedup_rows(all_hit);

    let hit_uuids: HashSet<&str> = all_hit.iter().map(|r| r.slice.uuid.as_str()).collect();
    let only_sparse: Vec<RankedSlice> = sparse
        .rows
        .into_iter()
        .filter(|r| !hit_uuids.contains(r.slice.uuid.as_str()))
        .map(|mut row| {
            row.bm25_score = Some(row.slice.score);
            row.cos_sim_score = Some(dense.stats.min);
            row.hit_type = Some(HitType::OnlySparse);
            row
        })
        .collect();

    let mut rows = all_hit;
    rows.extend(only_dense);
    rows.extend(only_sparse);

    let cos = column(&rows, |r| r.cos_sim_score);
    let bm25 = column(&rows, |r| r.bm25_score);
    let norm_cos = min_max_column(&cos, "cos_sim_score");
    let norm_bm25 = min_max_column(&bm25, "bm25_score");

    let w_cos = config.cos_sim_weight;
    let w_bm25 = config.bm25_weight;
    let merge: Vec<f64> = match config.reranker_method {
        RerankerMethod::CosAndBm25 => norm_cos
            .iter()
            .zip(&norm_bm25)
            .map(|(c, b)| w_cos * c + w_bm25 * b)
            .collect(),
        RerankerMethod::HybridReranker => {
            let norm_rr = reranker_column(&rows);
            norm_rr
                .iter()
                .zip(norm_cos.iter().zip(&norm_bm25))
                .map(|(r, (c, b))| (w_cos + w_bm25) * r + w_cos * c + w_bm25 * b)
                .collect()
        }
        RerankerMethod::OnlyReranker => reranker_column(&rows),
    };

    apply_merge(&mut rows, merge);
    rows
}

fn combine_dense_only(dense: Channel, config: &FusionConfig) -> Vec<RankedSlice> {
    let stats = dense.stats;
    let mut rows = dense.rows;
    for row in rows.iter_mut() {
        row.cos_sim_score = Some(row.slice.score);
        row.bm25_score = Some(MISSING_CHANNEL_SCORE);
        row.hit_type = Some(HitType::OnlyDense);
    }

    let cos = column(&rows, |r| r.cos_sim_score);
    let norm_cos = normalize_with(&cos, "cos_sim_score", DEGENERATE_MIN_MAX_SCORE, |x| {
        stats.min_max_centered(x)
    });

    let merge = match config.reranker_method {
        RerankerMethod::CosAndBm25 => norm_cos,
        RerankerMethod::HybridReranker => add(&reranker_column(&rows), &norm_cos),
        RerankerMethod::OnlyReranker => reranker_column(&rows),
    };

    apply_merge(&mut rows, merge);
    rows
}

fn combine_sparse_only(sparse: Channel, config: &FusionConfig) -> Vec<RankedSlice> {
    let stats = sparse.stats;
    let mut rows = sparse.rows;
    for row in rows.iter_mut() {
        row.bm25_score = Some(row.slice.score);
        row.cos_sim_score = Some(MISSING_CHANNEL_SCORE);
        row.hit_type = Some(HitType::OnlySparse);
    }

    let bm25 = column(&rows, |r| r.bm25_score);
    let merge = match config.reranker_method {
        RerankerMethod::CosAndBm25 => {
            normalize_with(&bm25, "bm25_score", DEGENERATE_ZERO_SCORE, |x| {
                stats.zero_score(x)
            })
        }
        RerankerMethod::HybridReranker => {
            let norm_bm25 = normalize_with(&bm25, "bm25_score", DEGENERATE_MIN_MAX_SCORE, |x| {
                stats.min_max_centered(x)
            });
            add(&reranker_column(&rows), &norm_bm25)
        }
        RerankerMethod::OnlyReranker => reranker_column(&rows),
    };

    apply_merge(&mut rows, merge);
    rows
}

// ============================================================================
// Helpers
// ============================================================================

fn column(rows: &[RankedSlice], get: impl Fn(&RankedSlice) -> Option<f64>) -> Vec<f64> {
    rows.iter()
        .map(|r| get(r).unwrap_or(MISSING_CHANNEL_SCORE))
        .collect()
}

/// Normalize every value; a degenerate column collapses to `fallback`.
fn normalize_with(
    values: &[f64],
    name: &str,
    fallback: f64,
    f: impl Fn(f64) -> Result<f64, NormalizeError>,
) -> Vec<f64> {
    let mut degenerate = None;
    let out = values
        .iter()
        .map(|&x| {
            f(x).unwrap_or_else(|e| {
                degenerate = Some(e);
                fallback
            })
        })
        .collect();
    if let Some(e) = degenerate {
        debug!("{name}: {e}, using {fallback}");
    }
    out
}

/// Min-max centered normalization over the column's own statistics.
fn min_max_column(values: &[f64], name: &str) -> Vec<f64> {
    match ColumnStats::from_scores(values) {
        Some(stats) => normalize_with(values, name, DEGENERATE_MIN_MAX_SCORE, |x| {
            stats.min_max_centered(x)
        }),
        None => Vec::new(),
    }
}

fn reranker_column(rows: &[RankedSlice]) -> Vec<f64> {
    let scores = column(rows, |r| r.reranker_score);
    min_max_column(&scores, "reranker_score")
}

fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

fn apply_merge(rows: &mut [RankedSlice], merge: Vec<f64>) {
    for (row, score) in rows.iter_mut().zip(merge) {
        row.merge_score = Some(score);
    }
}

/// Stable sort by `merge_score` descending; unscored rows sink to the end.
pub(crate) fn sort_by_merge_score(rows: &mut [RankedSlice]) {
    rows.sort_by(|a, b| match (a.merge_score, b.merge_score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Copy the first identity seen for each document `md5` onto every row of it.
pub(crate) fn propagate_identity(rows: &mut [RankedSlice]) {
    let mut first: HashMap<String, DocumentIdentity> = HashMap::new();
    for row in rows.iter_mut() {
        match first.get(&row.slice.document.md5) {
            Some(identity) => row.slice.document = identity.clone(),
            None => {
                first.insert(row.slice.document.md5.clone(), row.slice.document.clone());
            }
        }
    }
}

/// Keep the first row of each `(md5, text_hash)` pair.
pub(crate) fn dedup_rows(rows: Vec<RankedSlice>) -> Vec<RankedSlice> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    rows.into_iter()
        .filter(|r| seen.insert((r.slice.document.md5.clone(), r.text_hash.clone())))
        .collect()
}
