//! CLI definition and command dispatch for citerank.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (`--topk`, `--method`, `--max-slices`)
//! 2. Config file from `--config` / `CITERANK_CONFIG`
//! 3. Config file at `~/.citerank/config.yaml`
//! 4. Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use citerank_core::model_adapter::{HttpRerankerBackend, HttpSliceFetcher};
use citerank_core::{
    CitationPipeline, FaqCandidate, FaqRanker, FaqRanking, PipelineOutput, QueryInput,
    RankRequest, RankingConfig, RerankerMethod,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Citation ranking kernel: fuse retrieval hits into document citations
#[derive(Parser, Debug)]
#[command(name = "citerank")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "CITERANK_VERBOSE")]
    pub verbose: bool,

    /// Path to configuration file (default: ~/.citerank/config.yaml)
    #[arg(long, global = true, env = "CITERANK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank retrieval hits and assemble citations
    #[command(after_help = r#"EXAMPLES:
    # Rank a request and print citations
    citerank rank --input request.json

    # Keep the top 10 rows, fuse with channel scores only
    citerank rank --input request.json --topk 10 --method default

    # JSON output for scripting
    citerank rank --input request.json --json | jq '.reports[0].citations'
"#)]
    Rank {
        /// Request file: query, per-source dense/sparse pools, optional scopedDocId
        #[arg(short, long)]
        input: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Rows kept after fusion (overrides expansion.rerankTopk)
        #[arg(long)]
        topk: Option<usize>,

        /// Fusion method: default, hybrid_reranker or only_reranker
        #[arg(long)]
        method: Option<String>,

        /// Slices per citation (overrides citation.maxSlicePerCite)
        #[arg(long)]
        max_slices: Option<usize>,
    },

    /// Rank FAQ entries and pick a confident answer
    #[command(after_help = r#"EXAMPLES:
    # Rank FAQ candidates
    citerank faq --input faq.json

    # JSON output
    citerank faq --input faq.json --json
"#)]
    Faq {
        /// FAQ file: query and candidate entries
        #[arg(short, long)]
        input: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Input of `citerank faq`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaqRequest {
    query: QueryInput,

    #[serde(default)]
    candidates: Vec<FaqCandidate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a, T> {
    generated_at: String,
    #[serde(flatten)]
    body: &'a T,
}

impl<'a, T> JsonReport<'a, T> {
    fn new(body: &'a T) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            body,
        }
    }
}

// ============================================================================
// Entry Point
// ============================================================================

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always, debug with --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "citerank_core={},citerank_model={},citerank={}",
        log_level, log_level, log_level
    );

    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check your global config at ~/.citerank/config.yaml".to_string(),
            };
            eprintln!("error: Failed to load configuration: {:#}", e);
            eprintln!("hint: {}", hint);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Rank {
            input,
            json,
            topk,
            method,
            max_slices,
        } => apply_overrides(config, topk, method.as_deref(), max_slices)
            .and_then(|config| handle_rank(config, &input, json)),
        Command::Faq { input, json } => handle_faq(config, &input, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RankingConfig> {
    let config = match path {
        Some(path) => RankingConfig::from_path(path)?,
        None => RankingConfig::load_default()?,
    };
    Ok(config)
}

fn apply_overrides(
    mut config: RankingConfig,
    topk: Option<usize>,
    method: Option<&str>,
    max_slices: Option<usize>,
) -> anyhow::Result<RankingConfig> {
    if let Some(topk) = topk {
        config.expansion.rerank_topk = topk;
    }
    if let Some(method) = method {
        config.fusion.reranker_method = RerankerMethod::from_str(method)?;
    }
    if let Some(max) = max_slices {
        config.citation.max_slice_per_cite = max;
    }

    for warning in config.validate()? {
        tracing::warn!("Config warning: {}", warning);
    }
    Ok(config)
}

fn read_input<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

// ============================================================================
// Command Handlers
// ============================================================================

fn handle_rank(config: RankingConfig, input: &Path, json: bool) -> anyhow::Result<()> {
    let request: RankRequest = read_input(input)?;
    let reranker = HttpRerankerBackend::from_config(&config.services)?;
    let fetcher = HttpSliceFetcher::from_config(&config.services)?;

    let pipeline = CitationPipeline::new(config, &reranker, &fetcher);
    let output = runtime()?.block_on(pipeline.run(request));

    if json {
        println!("{}", serde_json::to_string_pretty(&JsonReport::new(&output))?);
    } else {
        print_rank_output(&output);
    }

    for failure in &output.failures {
        eprintln!("warning: source '{}' failed: {}", failure.data_source, failure.error);
    }
    if output.reports.is_empty() && !output.failures.is_empty() {
        bail!("all {} data sources failed", output.failures.len());
    }
    Ok(())
}

fn handle_faq(config: RankingConfig, input: &Path, json: bool) -> anyhow::Result<()> {
    let request: FaqRequest = read_input(input)?;
    let reranker = HttpRerankerBackend::from_config(&config.services)?;

    let ranker = FaqRanker::new(&reranker, config.faq.clone());
    let ranking = runtime()?.block_on(ranker.rank(&request.query, &request.candidates))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&JsonReport::new(&ranking))?);
    } else {
        print_faq_ranking(&ranking);
    }
    Ok(())
}

// ============================================================================
// Text Output
// ============================================================================

const PREVIEW_CHARS: usize = 80;

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

fn print_rank_output(output: &PipelineOutput) {
    if output.reports.is_empty() && output.failures.is_empty() {
        println!("No data sources in request.");
        return;
    }

    for report in &output.reports {
        println!("SOURCE {}", report.data_source);
        println!(
            "  fused: {} rows ({} all-hit, {} dense-only, {} sparse-only)",
            report.fused_rows,
            report.hit_counts.all_hit,
            report.hit_counts.only_dense,
            report.hit_counts.only_sparse
        );
        println!(
            "  kept:  {} rows, expansion {:?}",
            report.expanded_rows, report.expansion
        );

        if report.citations.is_empty() {
            println!("  (no citations)");
        }
        for (idx, citation) in report.citations.iter().enumerate() {
            println!();
            println!(
                "  [{}] {} ({} slices)",
                idx + 1,
                citation.document.name,
                citation.slices.len()
            );
            for slice in &citation.slices {
                println!("      #{:<4} {:>8.4}  {}", slice.no, slice.score, preview(&slice.content));
            }
        }
        println!();
    }
}

fn print_faq_ranking(ranking: &FaqRanking) {
    if ranking.answers.is_empty() {
        println!("No FAQ answers.");
        return;
    }

    if ranking.faq_find_answer {
        println!("Confident answer:");
    } else {
        println!("Candidate answers:");
    }
    for answer in &ranking.answers {
        let title = answer.meta.title.first().map(String::as_str).unwrap_or("");
        println!("  [{}] {:>8.4}  {}", answer.index, answer.score, preview(title));
    }
}
