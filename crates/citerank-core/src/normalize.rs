//! Score normalization.
//!
//! Channel scores live on unrelated scales (cosine in `[-1, 1]`, BM25 unbounded),
//! so each column is rescaled before fusion. Statistics are computed once per
//! column into an immutable [`ColumnStats`] and passed to the normalizers.
//!
//! A column without spread has no meaningful normalization; both normalizers
//! return [`NormalizeError::DegenerateDistribution`] instead of `NaN`/`inf`
//! and leave the fallback to the caller.

use serde::{Deserialize, Serialize};

use crate::errors::NormalizeError;

/// Summary statistics of one score column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); `0.0` for one value.
    pub std: f64,
}

impl ColumnStats {
    /// Compute statistics over a column. Returns `None` for an empty column.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let count = scores.len();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &s in scores {
            min = min.min(s);
            max = max.max(s);
            sum += s;
        }
        let mean = sum / count as f64;

        let std = if count > 1 {
            let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        Some(Self {
            count,
            min,
            max,
            mean,
            std,
        })
    }

    /// `(x - mean) / std`.
    pub fn zero_score(&self, x: f64) -> Result<f64, NormalizeError> {
        zero_score(x, self)
    }

    /// `(x - (min + max) / 2) / (max - min)`.
    pub fn min_max_centered(&self, x: f64) -> Result<f64, NormalizeError> {
        min_max_centered(x, self)
    }
}

/// Zero-score (z-score) normalization: `(x - mean) / std`.
pub fn zero_score(x: f64, stats: &ColumnStats) -> Result<f64, NormalizeError> {
    let spread = stats.std;
    if !is_usable_spread(spread) || !stats.mean.is_finite() {
        return Err(NormalizeError::DegenerateDistribution { spread });
    }
    Ok((x - stats.mean) / spread)
}

/// Min-max normalization centered on the midpoint, range `[-0.5, 0.5]`.
pub fn min_max_centered(x: f64, stats: &ColumnStats) -> Result<f64, NormalizeError> {
    let spread = stats.max - stats.min;
    if !is_usable_spread(spread) {
        return Err(NormalizeError::DegenerateDistribution { spread });
    }
    Ok((x - (stats.min + stats.max) / 2.0) / spread)
}

fn is_usable_spread(spread: f64) -> bool {
    spread.is_finite() && spread > 0.0
}
