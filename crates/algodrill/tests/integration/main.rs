//! Integration tests for algodrill
//!
//! Submissions are judged end to end through [`Judge`]: compiled, run on a
//! worker thread under a deadline, and reported.

use std::fs;

use algodrill::{Config, Judge, SubmissionRequest, TestCase};

mod catalog_solutions;
mod config_loading;
mod judging;
mod progress_store;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Judge with the embedded default configuration
pub(crate) fn test_judge() -> Judge {
    Judge::new(Config::default())
}

pub(crate) fn request(source: String, cases: Vec<TestCase>) -> SubmissionRequest {
    SubmissionRequest {
        source,
        test_cases: cases,
    }
}
