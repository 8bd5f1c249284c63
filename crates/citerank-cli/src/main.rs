//! # citerank CLI
//!
//! Command-line interface for the citation ranking kernel.
//!
//! Reads a ranking or FAQ request from a JSON file, runs it against the
//! configured rerank and slice-fetch services, and prints the result.
//! Run `citerank --help` for usage information.

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
