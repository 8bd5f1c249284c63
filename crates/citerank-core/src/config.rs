//! Configuration types for citerank.
//!
//! All settings live in one YAML file, `~/.citerank/config.yaml` by default:
//!
//! ```yaml
//! fusion:
//!   cosSimWeight: 1.3
//!   bm25Weight: 1.0
//!   rerankerMethod: only_reranker
//! expansion:
//!   rerankTopk: 15
//!   chooseMethod: method7
//! citation:
//!   maxSlicePerCite: 16
//! faq:
//!   fallbackLimit: 5
//!   outlierMultiplier: 0.5
//! services:
//!   rerank:
//!     url: http://localhost:8343/v1/rerank
//!   sliceFetch:
//!     url: http://localhost:8080/api/v1/slices/neighbors
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use citerank_model::{RerankServiceConfig, SliceFetchConfig};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BM25_WEIGHT, DEFAULT_COS_SIM_WEIGHT, DEFAULT_MAX_SLICE_PER_CITE, DEFAULT_RERANK_TOPK,
    FAQ_FALLBACK_LIMIT, FAQ_OUTLIER_MULTIPLIER,
};
use crate::errors::RankError;

// ============================================================================
// RankingConfig
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankingConfig {
    #[serde(default)]
    pub fusion: FusionConfig,

    #[serde(default)]
    pub expansion: ExpansionConfig,

    #[serde(default)]
    pub citation: CitationConfig,

    #[serde(default)]
    pub faq: FaqConfig,

    #[serde(default)]
    pub services: ServicesConfig,
}

impl RankingConfig {
    /// Load the configuration from the default location.
    ///
    /// Falls back to defaults when the home directory cannot be determined or
    /// the file does not exist.
    pub fn load_default() -> Result<Self, RankError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from a specific path.
    ///
    /// If the file does not exist, returns a default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RankError::InvalidConfig`] if the file exists but cannot be parsed.
    /// Returns [`RankError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, RankError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            RankError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            RankError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Get the default config directory (`~/.citerank`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".citerank"))
    }

    /// Get the default config file path (`~/.citerank/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join("config.yaml"))
    }

    /// Validate all sections.
    ///
    /// Returns non-fatal warnings, or an error for values that would break ranking.
    pub fn validate(&self) -> Result<Vec<String>, RankError> {
        let mut all_warnings = Vec::new();
        all_warnings.extend(self.fusion.validate()?);
        all_warnings.extend(self.expansion.validate()?);
        all_warnings.extend(self.citation.validate()?);
        all_warnings.extend(self.faq.validate()?);

        self.services
            .rerank
            .validate()
            .map_err(|e| RankError::InvalidConfiguration {
                message: format!("services.rerank: {e}"),
                hint: "Set services.rerank.url to the rerank endpoint".to_string(),
            })?;
        self.services
            .slice_fetch
            .validate()
            .map_err(|e| RankError::InvalidConfiguration {
                message: format!("services.sliceFetch: {e}"),
                hint: "Set services.sliceFetch.url and at least one index".to_string(),
            })?;

        Ok(all_warnings)
    }
}

// ============================================================================
// RerankerMethod
// ============================================================================

/// How `merge_score` is computed from the normalized channel scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RerankerMethod {
    /// Weighted cosine and BM25, reranker unused in the score.
    #[serde(rename = "default", alias = "cos_and_bm25")]
    CosAndBm25,
    /// Reranker plus weighted channel scores.
    HybridReranker,
    /// Reranker score alone.
    #[default]
    OnlyReranker,
}

impl fmt::Display for RerankerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CosAndBm25 => write!(f, "default"),
            Self::HybridReranker => write!(f, "hybrid_reranker"),
            Self::OnlyReranker => write!(f, "only_reranker"),
        }
    }
}

impl FromStr for RerankerMethod {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" | "cos_and_bm25" => Ok(Self::CosAndBm25),
            "hybrid_reranker" => Ok(Self::HybridReranker),
            "only_reranker" => Ok(Self::OnlyReranker),
            other => Err(RankError::InvalidConfiguration {
                message: format!("unknown reranker method '{other}'"),
                hint: "Use one of: default, cos_and_bm25, hybrid_reranker, only_reranker"
                    .to_string(),
            }),
        }
    }
}

// ============================================================================
// ChooseMethod
// ============================================================================

/// How the fused table is cut down and padded with context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChooseMethod {
    /// Truncate to the top rows.
    Method1,
    /// Keep lower-ranked rows that directly follow a kept row.
    Method2,
    /// Truncate, then fetch each kept row's successor from the index service.
    #[default]
    Method7,
}

impl fmt::Display for ChooseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method1 => write!(f, "method1"),
            Self::Method2 => write!(f, "method2"),
            Self::Method7 => write!(f, "method7"),
        }
    }
}

impl FromStr for ChooseMethod {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "method1" => Ok(Self::Method1),
            "method2" => Ok(Self::Method2),
            "method7" => Ok(Self::Method7),
            other => Err(RankError::InvalidConfiguration {
                message: format!("unknown choose method '{other}'"),
                hint: "Use one of: method1, method2, method7".to_string(),
            }),
        }
    }
}

// ============================================================================
// FusionConfig
// ============================================================================

fn default_cos_sim_weight() -> f64 {
    DEFAULT_COS_SIM_WEIGHT
}

fn default_bm25_weight() -> f64 {
    DEFAULT_BM25_WEIGHT
}

/// Dual-channel fusion settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FusionConfig {
    /// Weight of the normalized cosine score.
    #[serde(default = "default_cos_sim_weight")]
    pub cos_sim_weight: f64,

    /// Weight of the normalized BM25 score.
    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f64,

    #[serde(default)]
    pub reranker_method: RerankerMethod,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            cos_sim_weight: default_cos_sim_weight(),
            bm25_weight: default_bm25_weight(),
            reranker_method: RerankerMethod::default(),
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<Vec<String>, RankError> {
        let mut warnings = Vec::new();

        for (name, weight) in [
            ("cosSimWeight", self.cos_sim_weight),
            ("bm25Weight", self.bm25_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RankError::InvalidConfiguration {
                    message: format!("fusion.{name}={weight} must be a non-negative number"),
                    hint: "Defaults are cosSimWeight 1.3 and bm25Weight 1.0".to_string(),
                });
            }
        }

        if self.cos_sim_weight == 0.0 && self.bm25_weight == 0.0 {
            warnings.push(
                "fusion weights are both 0; merge scores will ignore channel scores".to_string(),
            );
        }

        if self.reranker_method == RerankerMethod::OnlyReranker
            && (self.cos_sim_weight != DEFAULT_COS_SIM_WEIGHT
                || self.bm25_weight != DEFAULT_BM25_WEIGHT)
        {
            warnings.push(
                "fusion weights have no effect with rerankerMethod=only_reranker".to_string(),
            );
        }

        Ok(warnings)
    }
}

// ============================================================================
// ExpansionConfig
// ============================================================================

fn default_rerank_topk() -> usize {
    DEFAULT_RERANK_TOPK
}

/// Top-K truncation and context expansion settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionConfig {
    /// Number of fused rows kept.
    #[serde(default = "default_rerank_topk")]
    pub rerank_topk: usize,

    #[serde(default)]
    pub choose_method: ChooseMethod,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            rerank_topk: default_rerank_topk(),
            choose_method: ChooseMethod::default(),
        }
    }
}

impl ExpansionConfig {
    pub fn validate(&self) -> Result<Vec<String>, RankError> {
        let mut warnings = Vec::new();

        if self.rerank_topk == 0 {
            return Err(RankError::InvalidConfiguration {
                message: "expansion.rerankTopk cannot be 0".to_string(),
                hint: "Set rerankTopk to at least 1 (default: 15)".to_string(),
            });
        }

        if self.rerank_topk > 200 {
            warnings.push(format!(
                "expansion.rerankTopk={} is very large; method7 will request that many successors",
                self.rerank_topk
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// CitationConfig
// ============================================================================

fn default_max_slice_per_cite() -> usize {
    DEFAULT_MAX_SLICE_PER_CITE
}

/// Citation assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CitationConfig {
    /// Upper bound on slices per citation.
    #[serde(default = "default_max_slice_per_cite")]
    pub max_slice_per_cite: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            max_slice_per_cite: default_max_slice_per_cite(),
        }
    }
}

impl CitationConfig {
    pub fn validate(&self) -> Result<Vec<String>, RankError> {
        if self.max_slice_per_cite == 0 {
            return Err(RankError::InvalidConfiguration {
                message: "citation.maxSlicePerCite cannot be 0".to_string(),
                hint: "Set maxSlicePerCite to at least 1 (default: 16)".to_string(),
            });
        }
        Ok(Vec::new())
    }
}

// ============================================================================
// FaqConfig
// ============================================================================

fn default_fallback_limit() -> usize {
    FAQ_FALLBACK_LIMIT
}

fn default_outlier_multiplier() -> f64 {
    FAQ_OUTLIER_MULTIPLIER
}

/// FAQ ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaqConfig {
    /// Max candidates returned when no confident answer is found.
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: usize,

    /// IQR multiplier of the outlier upper bound.
    #[serde(default = "default_outlier_multiplier")]
    pub outlier_multiplier: f64,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            fallback_limit: default_fallback_limit(),
            outlier_multiplier: default_outlier_multiplier(),
        }
    }
}

impl FaqConfig {
    pub fn validate(&self) -> Result<Vec<String>, RankError> {
        let mut warnings = Vec::new();

        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier < 0.0 {
            return Err(RankError::InvalidConfiguration {
                message: format!(
                    "faq.outlierMultiplier={} must be a non-negative number",
                    self.outlier_multiplier
                ),
                hint: "Default is 0.5".to_string(),
            });
        }

        if self.fallback_limit == 0 {
            warnings.push(
                "faq.fallbackLimit=0 disables the fallback list; only confident answers are returned"
                    .to_string(),
            );
        }

        Ok(warnings)
    }
}

// ============================================================================
// ServicesConfig
// ============================================================================

/// External service endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    #[serde(default)]
    pub rerank: RerankServiceConfig,

    #[serde(default)]
    pub slice_fetch: SliceFetchConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RankingConfig::default();
        assert_eq!(config.fusion.cos_sim_weight, 1.3);
        assert_eq!(config.fusion.bm25_weight, 1.0);
        assert_eq!(config.fusion.reranker_method, RerankerMethod::OnlyReranker);
        assert_eq!(config.expansion.rerank_topk, 15);
        assert_eq!(config.expansion.choose_method, ChooseMethod::Method7);
        assert_eq!(config.citation.max_slice_per_cite, 16);
        assert_eq!(config.faq.fallback_limit, 5);
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = RankingConfig::from_path(&temp.path().join("nope.yaml")).unwrap();
        assert_eq!(config, RankingConfig::default());
    }

    #[test]
    fn test_partial_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            "fusion:\n  rerankerMethod: cos_and_bm25\nexpansion:\n  rerankTopk: 4\n  chooseMethod: method2\n",
        )
        .unwrap();

        let config = RankingConfig::from_path(&path).unwrap();
        assert_eq!(config.fusion.reranker_method, RerankerMethod::CosAndBm25);
        assert_eq!(config.fusion.cos_sim_weight, 1.3);
        assert_eq!(config.expansion.rerank_topk, 4);
        assert_eq!(config.expansion.choose_method, ChooseMethod::Method2);
        assert_eq!(config.citation.max_slice_per_cite, 16);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "fusion: [not, a, map]\n").unwrap();
        assert!(matches!(
            RankingConfig::from_path(&path),
            Err(RankError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_topk_rejected() {
        let mut config = RankingConfig::default();
        config.expansion.rerank_topk = 0;
        assert!(matches!(
            config.validate(),
            Err(RankError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = RankingConfig::default();
        config.fusion.bm25_weight = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ignored_weights_warn() {
        let mut config = RankingConfig::default();
        config.fusion.cos_sim_weight = 2.0;
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("only_reranker"));
    }

    #[test]
    fn test_empty_service_url_rejected() {
        let mut config = RankingConfig::default();
        config.services.rerank.url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("cos_and_bm25".parse::<RerankerMethod>().unwrap(), RerankerMethod::CosAndBm25);
        assert_eq!("Default".parse::<RerankerMethod>().unwrap(), RerankerMethod::CosAndBm25);
        assert!("bogus".parse::<RerankerMethod>().is_err());
        assert_eq!("METHOD1".parse::<ChooseMethod>().unwrap(), ChooseMethod::Method1);
        assert_eq!(RerankerMethod::HybridReranker.to_string(), "hybrid_reranker");
    }

    #[test]
    fn test_method_serde_names() {
        let m: RerankerMethod = serde_yaml::from_str("default").unwrap();
        assert_eq!(m, RerankerMethod::CosAndBm25);
        let m: RerankerMethod = serde_yaml::from_str("hybrid_reranker").unwrap();
        assert_eq!(m, RerankerMethod::HybridReranker);
    }
}
