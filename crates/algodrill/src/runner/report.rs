//! Caller-facing projections of a [`RunReport`]

use std::fmt::Write as _;

use serde_json::{Value as Json, json};

use crate::types::RunReport;

/// Wire shape: `{"outcomes": [...]}` for completed runs, `{"error": "..."}`
/// otherwise
pub fn to_wire(report: &RunReport) -> Json {
    match report {
        RunReport::Completed { outcomes, .. } => json!({ "outcomes": outcomes }),
        failed => json!({ "error": failed.failure_message().unwrap_or_default() }),
    }
}

/// `passed/total` for completed runs
pub fn summary(report: &RunReport) -> Option<String> {
    report
        .outcomes()
        .map(|outcomes| format!("{}/{}", report.passed_count(), outcomes.len()))
}

/// Human-readable rendering, one block per test case
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    match report {
        RunReport::Completed { outcomes, console } => {
            for (i, outcome) in outcomes.iter().enumerate() {
                let mark = if outcome.passed { "PASS" } else { "FAIL" };
                let _ = writeln!(out, "[{mark}] case {}", i + 1);
                let _ = writeln!(out, "  input:    {}", outcome.input);
                let _ = writeln!(out, "  expected: {}", outcome.expected);
                let _ = writeln!(out, "  actual:   {}", outcome.actual);
                if let Some(error) = &outcome.error {
                    let _ = writeln!(out, "  error:    {error}");
                }
            }
            if !console.is_empty() {
                out.push_str("console:\n");
                for line in console {
                    let _ = writeln!(out, "  [{}] {}", line.level, line.text);
                }
            }
            if let Some(summary) = summary(report) {
                let _ = writeln!(out, "passed {summary}");
            }
        }
        RunReport::CompilationFailure { message } => {
            let _ = writeln!(out, "compilation failed: {message}");
        }
        RunReport::TimeoutFailure { message } => {
            let _ = writeln!(out, "{message}");
        }
        RunReport::ExecutorFault { message } => {
            let _ = writeln!(out, "executor fault: {message}");
        }
    }
    out
}
