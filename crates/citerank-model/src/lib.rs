//! # citerank-model
//!
//! Service layer for citerank: async HTTP clients for the external services
//! the ranking kernel depends on.
//!
//! - **Rerank service**: cross-encoder relevance scores for `(query, text)` pairs
//! - **Slice-fetch service**: the slices that follow a given slice in its document
//!
//! This crate holds no ranking logic. `citerank-core` wraps these clients in
//! its own collaborator traits (see `citerank_core::model_adapter`), and test
//! doubles live in the consuming crates.

pub mod config;
pub mod error;
pub mod rerank;
pub mod slice_fetch;

pub use config::{RerankServiceConfig, SliceFetchConfig};
pub use error::{ModelError, ModelResult};
pub use rerank::HttpRerankClient;
pub use slice_fetch::{HttpSliceFetchClient, NeighborSlice};
