//! Centralized constants for citerank-core.
//!
//! Scores, thresholds and defaults shared by several modules live here so the
//! ranking formulas read the same everywhere.

// ============================================================================
// Fusion
// ============================================================================

/// Default weight of the normalized dense (cosine) score.
pub const DEFAULT_COS_SIM_WEIGHT: f64 = 1.3;

/// Default weight of the normalized sparse (BM25) score.
pub const DEFAULT_BM25_WEIGHT: f64 = 1.0;

/// Score written into the absent channel when only one pool is present.
pub const MISSING_CHANNEL_SCORE: f64 = -1.0;

/// Value a degenerate min-max column resolves to: every row is the top row.
pub const DEGENERATE_MIN_MAX_SCORE: f64 = 0.5;

/// Value a degenerate zero-score column resolves to: every row sits on the mean.
pub const DEGENERATE_ZERO_SCORE: f64 = 0.0;

// ============================================================================
// Expansion
// ============================================================================

/// Default number of fused rows kept before expansion.
pub const DEFAULT_RERANK_TOPK: usize = 15;

// ============================================================================
// Citations
// ============================================================================

/// Default upper bound on slices per citation.
pub const DEFAULT_MAX_SLICE_PER_CITE: usize = 16;

/// Score given to a slice whose score is missing or NaN.
pub const MISSING_SLICE_SCORE: f64 = -100.0;

// ============================================================================
// FAQ
// ============================================================================

/// Lexical score of an exact (normalized) title match.
pub const FAQ_EXACT_MATCH_SCORE: f64 = 100.0;

/// Character overlap ratio from which a title counts as a lexical match.
pub const FAQ_OVERLAP_THRESHOLD: f64 = 0.8;

/// Scale applied to `ratio - threshold` for a lexical match.
pub const FAQ_OVERLAP_SCALE: f64 = 5.0;

/// Lexical score of a title that does not match.
pub const FAQ_NO_MATCH_SCORE: f64 = -1.0;

/// Below this many candidates the IQR test is replaced by a max check.
pub const FAQ_MIN_CANDIDATES_FOR_IQR: usize = 5;

/// Max aggregate score required to answer when there are few candidates.
pub const FAQ_SMALL_POOL_MIN_SCORE: f64 = 3.0;

/// Default IQR multiplier for the outlier upper bound.
pub const FAQ_OUTLIER_MULTIPLIER: f64 = 0.5;

/// Default number of candidates returned by the fallback path.
pub const FAQ_FALLBACK_LIMIT: usize = 5;

/// Image detail strings this short (after trim) are ignored.
pub const FAQ_MIN_IMAGE_DETAIL_CHARS: usize = 2;
