//! # citerank-core
//!
//! Retrieval ranking and citation assembly kernel.
//!
//! Takes a query plus dense and sparse pools of candidate text slices and
//! produces ranked, deduplicated, budget-bounded document citations. A separate
//! path ranks FAQ entries and decides between one confident answer and a
//! fallback list.
//!
//! ## Main Types
//!
//! - [`CitationPipeline`] – runs fusion, expansion and assembly per data source
//! - [`FaqRanker`] – FAQ answer selection
//! - [`RankingConfig`] – configuration loaded from `~/.citerank/config.yaml`
//! - [`RankError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`normalize`] – zero-score and min-max-centered normalization
//! - [`fusion`] – dense/sparse fusion into one ranked table
//! - [`expand`] – top-K truncation and context expansion
//! - [`snippet`] – citation assembly
//! - [`faq`] – FAQ ranking
//! - [`model_adapter`] – HTTP service backends for the collaborator traits
//!
//! ## Example
//!
//! ```ignore
//! use citerank_core::{CitationPipeline, RankingConfig};
//! use citerank_core::model_adapter::{HttpRerankerBackend, HttpSliceFetcher};
//!
//! let config = RankingConfig::load_default()?;
//! let reranker = HttpRerankerBackend::from_config(&config.services)?;
//! let fetcher = HttpSliceFetcher::from_config(&config.services)?;
//!
//! let pipeline = CitationPipeline::new(config, &reranker, &fetcher);
//! let output = pipeline.run(request).await;
//! for citation in output.citations() {
//!     println!("{}: {} slices", citation.document.name, citation.slices.len());
//! }
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod expand;
pub mod faq;
pub mod fusion;
pub mod model_adapter;
pub mod normalize;
pub mod pipeline;
pub mod reranker;
pub mod slice_fetch;
pub mod snippet;
pub mod text;
pub mod types;

pub use config::{ChooseMethod, RankingConfig, RerankerMethod};
pub use errors::{NormalizeError, RankError};
pub use expand::{Expansion, ExpansionOutcome};
pub use faq::FaqRanker;
pub use fusion::{FusedTable, HitCounts};
pub use normalize::ColumnStats;
pub use pipeline::{CitationPipeline, DataSourcePools, PipelineOutput, RankRequest};
pub use reranker::RerankerBackend;
pub use slice_fetch::NextSliceFetcher;
pub use snippet::SnippetAssembler;
pub use types::{
    CandidateSlice, Citation, CitationSlice, DocumentIdentity, FaqAnswer, FaqCandidate,
    FaqRanking, HitType, QueryInput, RankedSlice, SliceRecord,
};
