use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Guards applied to one run of a submission
///
/// Every field is optional so that limits can be layered: config defaults,
/// then per-call overrides (see [`ExecutionLimits::with_overrides`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Engine steps for the whole run (unbounded when `None`), counted in
    /// blocks of [`ExecutionLimits::STEPS_PER_CHECK`]
    #[serde(default)]
    pub max_steps: Option<u64>,

    /// Worker thread stack size in kilobytes
    #[serde(default)]
    pub stack_size_kb: Option<u64>,

    /// Heap the engine may allocate, in kilobytes
    #[serde(default)]
    pub memory_limit_kb: Option<u64>,

    /// Console lines kept per run; later lines are dropped
    #[serde(default)]
    pub max_console_lines: Option<usize>,
}

impl ExecutionLimits {
    /// 1 megabyte in kilobytes
    pub const MB: u64 = 1024;

    /// Engine steps between two interrupt checks
    pub const STEPS_PER_CHECK: u64 = 10_000;

    pub const DEFAULT_STACK_SIZE_KB: u64 = 256 * Self::MB;
    pub const DEFAULT_MEMORY_LIMIT_KB: u64 = 512 * Self::MB;
    pub const DEFAULT_CONSOLE_LINES: usize = 200;

    /// Create limits with the default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step budget
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Set the worker stack size in kilobytes
    pub fn with_stack_size_kb(mut self, kb: u64) -> Self {
        self.stack_size_kb = Some(kb);
        self
    }

    /// Set the engine heap limit in kilobytes
    pub fn with_memory_limit_kb(mut self, kb: u64) -> Self {
        self.memory_limit_kb = Some(kb);
        self
    }

    /// Set how many console lines are kept
    pub fn with_max_console_lines(mut self, lines: usize) -> Self {
        self.max_console_lines = Some(lines);
        self
    }

    /// Apply overrides from another ExecutionLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ExecutionLimits) -> ExecutionLimits {
        ExecutionLimits {
            max_steps: overrides.max_steps.or(self.max_steps),
            stack_size_kb: overrides.stack_size_kb.or(self.stack_size_kb),
            memory_limit_kb: overrides.memory_limit_kb.or(self.memory_limit_kb),
            max_console_lines: overrides.max_console_lines.or(self.max_console_lines),
        }
    }

    pub fn stack_size_bytes(&self) -> usize {
        (self.stack_size_kb.unwrap_or(Self::DEFAULT_STACK_SIZE_KB) * 1024) as usize
    }

    /// Stack the engine may use before raising `RangeError`; the rest of the
    /// worker stack is headroom for the host frames around it
    pub fn engine_stack_bytes(&self) -> usize {
        self.stack_size_bytes() / 4 * 3
    }

    pub fn memory_limit_bytes(&self) -> usize {
        (self.memory_limit_kb.unwrap_or(Self::DEFAULT_MEMORY_LIMIT_KB) * 1024) as usize
    }

    pub fn console_lines(&self) -> usize {
        self.max_console_lines.unwrap_or(Self::DEFAULT_CONSOLE_LINES)
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: None,
            stack_size_kb: Some(Self::DEFAULT_STACK_SIZE_KB),
            memory_limit_kb: Some(Self::DEFAULT_MEMORY_LIMIT_KB),
            max_console_lines: Some(Self::DEFAULT_CONSOLE_LINES),
        }
    }
}

/// One input/expected pair used to score a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Positional arguments
    pub input: Vec<Json>,
    pub expected: Json,
}

impl TestCase {
    pub fn new(input: Vec<Json>, expected: Json) -> Self {
        Self { input, expected }
    }
}

/// A submission and the cases it is scored against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub source: String,
    pub test_cases: Vec<TestCase>,
}

/// Result of running one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Rendered arguments, as the submission received them
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Severity of a captured console line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Warn,
    Error,
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        })
    }
}

/// A line written by the submission through `console.*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub text: String,
}

/// Full result of evaluating one submission
///
/// Either every test case ran (`Completed`, one outcome per case in order) or
/// the run failed as a whole with a single message; never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunReport {
    CompilationFailure {
        message: String,
    },
    TimeoutFailure {
        message: String,
    },
    ExecutorFault {
        message: String,
    },
    Completed {
        outcomes: Vec<TestOutcome>,
        #[serde(default)]
        console: Vec<ConsoleLine>,
    },
}

impl RunReport {
    /// Outcomes of a completed run
    pub fn outcomes(&self) -> Option<&[TestOutcome]> {
        match self {
            RunReport::Completed { outcomes, .. } => Some(outcomes),
            _ => None,
        }
    }

    /// Message of a failed run
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            RunReport::CompilationFailure { message }
            | RunReport::TimeoutFailure { message }
            | RunReport::ExecutorFault { message } => Some(message),
            RunReport::Completed { .. } => None,
        }
    }

    /// Check if the run completed and every case passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.outcomes()
            .is_some_and(|outcomes| outcomes.iter().all(|o| o.passed))
    }

    /// Number of passing cases (zero for failed runs)
    pub fn passed_count(&self) -> usize {
        self.outcomes()
            .map_or(0, |outcomes| outcomes.iter().filter(|o| o.passed).count())
    }
}
