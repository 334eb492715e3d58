//! Entry-point resolution
//!
//! Finds the name of the first top-level `function` declaration by scanning
//! the raw text, so a missing entry point is reported on its own terms.

use crate::compiler::CompileError;
use crate::compiler::scan::{Scanner, is_word_char};

/// Characters after which `function` starts an expression, not a declaration
const EXPRESSION_CONTEXT: &[char] = &[
    '=', '(', '[', ',', ':', '?', '!', '&', '|', '+', '-', '*', '/', '%', '<', '>', '~', '^', '.',
];

/// Name of the first top-level function declaration in `source`
pub fn resolve_entry_point(source: &str) -> Result<String, CompileError> {
    let mut scanner = Scanner::new(source);
    let mut depth = 0usize;
    let mut prev: Option<char> = None;

    while let Some(c) = scanner.peek() {
        match c {
            _ if c.is_whitespace() => scanner.pos += 1,
            _ if scanner.at_comment() => scanner.skip_comment(),
            '"' | '\'' => {
                scanner.skip_string(c);
                prev = Some(c);
            }
            '`' => {
                scanner.skip_template();
                prev = Some(c);
            }
            '{' | '(' | '[' => {
                depth += 1;
                scanner.pos += 1;
                prev = Some(c);
            }
            '}' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                scanner.pos += 1;
                prev = Some(c);
            }
            _ if is_word_char(c) => {
                let word = scanner.word();
                if word == "function" && depth == 0 && !prev.is_some_and(|p| EXPRESSION_CONTEXT.contains(&p)) {
                    if let Some(name) = scanner.declared_name() {
                        return Ok(name);
                    }
                }
                // identifiers never put the scanner in expression context
                prev = Some('a');
            }
            _ => {
                scanner.pos += 1;
                prev = Some(c);
            }
        }
    }
    Err(CompileError::NoEntryPoint)
}

impl Scanner {
    /// Identifier following a `function` keyword (generators included)
    fn declared_name(&mut self) -> Option<String> {
        self.skip_trivia();
        if self.peek() == Some('*') {
            self.pos += 1;
            self.skip_trivia();
        }
        match self.peek() {
            Some(c) if is_word_char(c) && !c.is_ascii_digit() => Some(self.word()),
            _ => None,
        }
    }
}
