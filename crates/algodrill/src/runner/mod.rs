//! Judge for algodrill
//!
//! Provides the high-level API: compile a submission, run it on an isolated
//! worker against its test cases under a deadline, and report the outcome.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

pub use crate::runner::cases::{json_eq, render, run_cases};
pub use crate::runner::slots::{SlotTicket, SubmissionSlots, Superseded};
pub use crate::runner::supervisor::{Supervised, supervise};

pub mod cases;
pub mod report;
pub mod slots;
pub mod supervisor;

use crate::{
    compiler::{self, CompileError, CompiledUnit},
    config::Config,
    sandbox::{
        CodeLoader, ConsoleCapture, Interruption, KillSwitch, LoadContext, LoadError,
        QuickJsLoader, worker,
    },
    types::{ConsoleLine, ExecutionLimits, RunReport, SubmissionRequest, TestCase, TestOutcome},
};

/// A compiled submission and the entry point it will be judged through
#[derive(Debug, Clone)]
pub struct CompiledSubmission {
    pub unit: CompiledUnit,
    pub entry: String,
}

/// What the worker sends back when it ran every case
type WorkerAnswer = Result<(Vec<TestOutcome>, Vec<ConsoleLine>), WorkerFailure>;

/// Why the worker stopped before running every case
#[derive(Debug)]
enum WorkerFailure {
    Load(LoadError),
    Interrupted(Interruption),
}

impl From<LoadError> for WorkerFailure {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Interrupted(reason) => WorkerFailure::Interrupted(reason),
            other => WorkerFailure::Load(other),
        }
    }
}

/// High-level judge for submissions
#[derive(Clone)]
pub struct Judge {
    config: Config,
    loader: Arc<dyn CodeLoader>,
    slots: Arc<SubmissionSlots>,
}

impl fmt::Debug for Judge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Judge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Judge {
    /// Create a new judge with the given configuration
    pub fn new(config: Config) -> Self {
        Self::with_loader(config, Arc::new(QuickJsLoader))
    }

    /// Create a new judge with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Create a judge that loads submissions through `loader`
    pub fn with_loader(config: Config, loader: Arc<dyn CodeLoader>) -> Self {
        Self {
            config,
            loader,
            slots: Arc::new(SubmissionSlots::new()),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compile source code and find its entry point
    ///
    /// Syntax errors win over a missing entry point: source that does not
    /// parse is reported with its diagnostic even if it also declares no
    /// function.
    #[instrument(skip_all, fields(len = source.len()))]
    pub fn compile(&self, source: &str) -> Result<CompiledSubmission, CompileError> {
        let unit = compiler::compile(source)?;
        let entry = compiler::resolve_entry_point(source)?;
        debug!(%entry, "resolved entry point");
        Ok(CompiledSubmission { unit, entry })
    }

    /// Judge a submission with the configured deadline
    pub async fn run(&self, request: &SubmissionRequest) -> RunReport {
        self.run_with_timeout(request, self.config.timeout()).await
    }

    /// Judge a submission with an explicit deadline
    pub async fn run_with_timeout(&self, request: &SubmissionRequest, timeout: Duration) -> RunReport {
        match self.compile(&request.source) {
            Ok(submission) => {
                self.execute(&submission, &request.test_cases, timeout, None)
                    .await
            }
            Err(e) => {
                info!(error = %e, "compilation failed");
                RunReport::CompilationFailure {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Run a compiled submission against `cases` on a fresh worker
    pub async fn execute(
        &self,
        submission: &CompiledSubmission,
        cases: &[TestCase],
        timeout: Duration,
        limits: Option<&ExecutionLimits>,
    ) -> RunReport {
        self.dispatch(submission, cases, timeout, limits, KillSwitch::new())
            .await
    }

    /// Judge a submission as the only active run of `slot`
    ///
    /// A newer run in the same slot kills this one; its result is then
    /// returned as [`Superseded`] instead of a report.
    pub async fn run_in_slot(
        &self,
        slot: &str,
        request: &SubmissionRequest,
    ) -> Result<RunReport, Superseded> {
        let ticket = self.slots.begin(slot);
        let report = match self.compile(&request.source) {
            Ok(submission) => {
                self.dispatch(
                    &submission,
                    &request.test_cases,
                    self.config.timeout(),
                    None,
                    ticket.kill_switch().clone(),
                )
                .await
            }
            Err(e) => RunReport::CompilationFailure {
                message: e.to_string(),
            },
        };
        self.slots.finish(&ticket)?;
        Ok(report)
    }

    #[instrument(skip_all, fields(entry = %submission.entry, cases = cases.len(), timeout_ms = timeout.as_millis() as u64))]
    async fn dispatch(
        &self,
        submission: &CompiledSubmission,
        cases: &[TestCase],
        timeout: Duration,
        limits: Option<&ExecutionLimits>,
        kill: KillSwitch,
    ) -> RunReport {
        let limits = self.config.effective_limits(limits);
        let stack_size = limits.stack_size_bytes();

        let loader = Arc::clone(&self.loader);
        let unit = submission.unit.clone();
        let entry = submission.entry.clone();
        let cases = cases.to_vec();
        let worker_kill = kill.clone();

        let job = move || -> WorkerAnswer {
            let console = ConsoleCapture::new();
            let ctx = LoadContext {
                limits,
                kill: worker_kill,
                console: Box::new(console.clone()),
            };
            let mut callable = loader.load(&unit, &entry, ctx)?;
            let outcomes = run_cases(callable.as_mut(), &cases).map_err(WorkerFailure::Interrupted)?;
            Ok((outcomes, console.take()))
        };

        let rx = match worker::spawn("algodrill-worker", stack_size, job) {
            Ok(rx) => rx,
            Err(e) => {
                return RunReport::ExecutorFault {
                    message: e.to_string(),
                };
            }
        };

        let report = match supervise(rx, &kill, timeout).await {
            Supervised::Finished(Ok((outcomes, console))) => RunReport::Completed { outcomes, console },
            Supervised::Finished(Err(WorkerFailure::Load(e @ LoadError::Engine(_)))) => RunReport::ExecutorFault {
                message: e.to_string(),
            },
            Supervised::Finished(Err(WorkerFailure::Load(e))) => RunReport::CompilationFailure {
                message: e.to_string(),
            },
            Supervised::Finished(Err(WorkerFailure::Interrupted(reason))) => RunReport::TimeoutFailure {
                message: interruption_message(reason, timeout),
            },
            Supervised::TimedOut => RunReport::TimeoutFailure {
                message: interruption_message(Interruption::Killed, timeout),
            },
            Supervised::Faulted(e) => RunReport::ExecutorFault {
                message: e.to_string(),
            },
        };
        info!(
            passed = report.passed_count(),
            completed = report.outcomes().is_some(),
            "run finished"
        );
        report
    }
}

fn interruption_message(reason: Interruption, timeout: Duration) -> String {
    match reason {
        Interruption::Killed => format!(
            "Time limit exceeded: submission did not finish within {} ms",
            timeout.as_millis()
        ),
        Interruption::StepBudgetExhausted => {
            "Time limit exceeded: submission used up its step budget".to_string()
        }
    }
}
