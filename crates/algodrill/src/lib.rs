//! A judge engine for algorithm drills.
//!
//! algodrill compiles a learner's TypeScript-flavoured submission, runs its
//! entry function against a set of test cases on an isolated worker thread,
//! and reports a pass/fail outcome per case.
//!
//! # Features
//!
//! - **Compiler**: Parses TypeScript with oxc and erases type-level syntax, keeping line and column positions.
//! - **Isolated execution**: Each run gets a fresh QuickJS runtime on its own thread, reachable only by message.
//! - **Guaranteed termination**: A wall-clock deadline backed by a kill switch the submission cannot catch.
//! - **Per-case results**: A throwing case is recorded and the remaining cases still run.
//! - **Catalog and progress**: Built-in problem set and a file-backed progress store.
//! - **TOML configuration**: Deadline and resource limits with environment overrides.

pub use catalog::{Catalog, CatalogError, Difficulty, Problem, ProblemFilter, StaticCatalog};
pub use compiler::{CompileError, CompiledUnit, compile, resolve_entry_point};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG};
pub use progress::{FileProgressStore, ProgressError, ProgressStore, Status};
pub use runner::{CompiledSubmission, Judge, Superseded};
pub use sandbox::{Callable, CodeLoader, KillSwitch, LoadError, QuickJsLoader};
pub use types::{
    ConsoleLevel, ConsoleLine, ExecutionLimits, RunReport, SubmissionRequest, TestCase,
    TestOutcome,
};

pub mod catalog;
pub mod compiler;
pub mod config;
pub mod progress;
pub mod runner;
pub mod sandbox;
pub mod types;
