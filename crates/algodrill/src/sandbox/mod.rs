//! Isolation boundary for submitted code
//!
//! Submitted code is only ever reached through a [`CodeLoader`], which turns
//! a compiled unit into a [`Callable`]. Loading and every invocation happen
//! on a dedicated worker thread (see [`worker`]); the caller keeps nothing
//! but a [`KillSwitch`] and the receiving end of a oneshot channel.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value as Json;
use thiserror::Error;

use crate::compiler::CompiledUnit;
use crate::types::ExecutionLimits;
pub use crate::types::{ConsoleLevel, ConsoleLine};

mod inspect;
pub mod quickjs;
pub mod worker;

pub use quickjs::QuickJsLoader;
pub use worker::WorkerError;

/// Why the engine stopped without finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The kill switch was tripped from outside
    Killed,
    /// The configured step budget ran out
    StepBudgetExhausted,
}

/// Cross-thread flag that aborts a running submission
///
/// The engine's interrupt handler checks it every few thousand steps.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Destination for `console.*` output
pub trait ConsoleSink {
    fn write(&mut self, level: ConsoleLevel, line: String);
}

/// Console sink that keeps lines in memory
///
/// Clones share the same buffer, so one handle can be given to the loader
/// while another collects the lines afterwards.
#[derive(Debug, Clone, Default)]
pub struct ConsoleCapture {
    lines: Rc<RefCell<Vec<ConsoleLine>>>,
}

impl ConsoleCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the captured lines
    pub fn take(&self) -> Vec<ConsoleLine> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }
}

impl ConsoleSink for ConsoleCapture {
    fn write(&mut self, level: ConsoleLevel, line: String) {
        tracing::debug!(%level, line = %line, "submission console");
        self.lines.borrow_mut().push(ConsoleLine { level, text: line });
    }
}

/// Everything a loader needs besides the code itself
pub struct LoadContext {
    pub limits: ExecutionLimits,
    pub kill: KillSwitch,
    pub console: Box<dyn ConsoleSink>,
}

/// Errors that occur while loading a submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Error while loading submission: {0}")]
    TopLevel(String),

    #[error("Entry point '{0}' is not defined")]
    EntryPointMissing(String),

    #[error("Entry point '{0}' is not a function")]
    NotCallable(String),

    #[error("loading was interrupted: {0:?}")]
    Interrupted(Interruption),

    #[error("Failed to start the engine: {0}")]
    Engine(String),
}

/// Errors that occur while invoking a loaded entry point
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// The submission threw; the message is what a learner should see
    #[error("{0}")]
    Thrown(String),

    #[error("invocation was interrupted: {0:?}")]
    Interrupted(Interruption),
}

/// Result of one successful invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// JSON form of the return value; `None` when it has none (`undefined`,
    /// functions)
    pub returned: Option<Json>,
    /// Set when the call returned `undefined`: the first argument as it is
    /// after the call
    pub first_argument: Option<Json>,
}

/// A loaded entry point
pub trait Callable {
    /// Invoke with positional arguments; each call gets fresh copies
    fn invoke(&mut self, args: &[Json]) -> Result<Invocation, InvokeError>;
}

/// Capability that turns compiled code into something callable
pub trait CodeLoader: Send + Sync {
    /// Run the unit's top-level code and resolve `entry`
    fn load(&self, unit: &CompiledUnit, entry: &str, ctx: LoadContext) -> Result<Box<dyn Callable>, LoadError>;
}
