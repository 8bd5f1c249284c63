//! Shared test utilities for citerank-cli integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Get a Command for the citerank binary.
///
/// # Panics
///
/// Panics if the citerank binary cannot be found. This should not happen
/// in a properly configured test environment.
#[allow(deprecated)]
pub fn citerank_cmd() -> Command {
    Command::cargo_bin("citerank").expect("citerank binary should exist")
}

/// Write a config whose services point at a closed local port.
pub fn write_unreachable_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.yaml");
    fs::write(
        &path,
        r#"services:
  rerank:
    url: http://127.0.0.1:9/v1/rerank
    timeoutSecs: 2
  sliceFetch:
    url: http://127.0.0.1:9/api/v1/slices/neighbors
    timeoutSecs: 2
"#,
    )
    .expect("write config");
    path
}

/// Write `content` to `name` under `dir`.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write input file");
    path
}
