//! Source compiler for submissions
//!
//! Turns TypeScript-flavoured source text into a [`CompiledUnit`]: the
//! source is parsed with oxc, checked for constructs the judge cannot run,
//! and every type-level construct is erased. Compilation never evaluates any
//! part of the submission.

use std::fmt;
use std::sync::Arc;

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use thiserror::Error;
use tracing::{debug, instrument};

pub mod entry;
mod erase;
pub(crate) mod scan;

pub use entry::resolve_entry_point;

/// Deepest bracket or prefix-operator nesting accepted
pub const MAX_NESTING: usize = 128;

/// 1-based source position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Position {
    /// Position of the byte `offset` in `source`; columns count characters
    pub(crate) fn at(source: &str, offset: usize) -> Self {
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let col = before.rsplit('\n').next().map_or(0, |last| last.chars().count()) + 1;
        Self {
            line: line as u32,
            col: col as u32,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

/// Errors that occur while compiling a submission
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("SyntaxError: {message} ({pos})")]
    Syntax { message: String, pos: Position },

    #[error("Unsupported construct: {construct} ({pos})")]
    Unsupported { construct: String, pos: Position },

    #[error("No entry point found: the submission must declare a top-level function")]
    NoEntryPoint,
}

/// Executable form of a submission
///
/// Immutable and cheap to clone.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    script: Arc<str>,
    source: Arc<str>,
}

impl CompiledUnit {
    /// Plain JavaScript the engine runs; lines and columns match the source
    pub fn script(&self) -> &str {
        &self.script
    }

    /// The source text this unit was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Compile submission source text
#[instrument(skip(source), fields(len = source.len()))]
pub fn compile(source: &str) -> Result<CompiledUnit, CompileError> {
    if let Some(pos) = scan::nesting_overflow(source, MAX_NESTING) {
        return Err(CompileError::Unsupported {
            construct: format!("nesting deeper than {MAX_NESTING} levels"),
            pos,
        });
    }

    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::ts()).parse();
    if let Some(error) = parsed.errors.first() {
        let offset = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map_or(0, |label| label.offset());
        return Err(CompileError::Syntax {
            message: error.message.to_string(),
            pos: Position::at(source, offset),
        });
    }
    debug!(statements = parsed.program.body.len(), "parsed");

    let script = erase::erase(&parsed.program, source)?;
    Ok(CompiledUnit {
        script: script.into(),
        source: source.into(),
    })
}
