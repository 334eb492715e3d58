//! Character scanner over raw source text
//!
//! Knows just enough about the lexical grammar to step over comments,
//! strings and template literals. Used where a full parse is either not
//! wanted (entry-point resolution) or not yet safe (nesting guard).

use crate::compiler::Position;

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub(crate) struct Scanner {
    chars: Vec<char>,
    pub(crate) pos: usize,
}

impl Scanner {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    pub(crate) fn at_comment(&self) -> bool {
        self.peek() == Some('/') && matches!(self.peek_at(1), Some('/') | Some('*'))
    }

    /// 1-based position of the current character
    pub(crate) fn position(&self) -> Position {
        let mut pos = Position { line: 1, col: 1 };
        for &c in &self.chars[..self.pos.min(self.chars.len())] {
            if c == '\n' {
                pos.line += 1;
                pos.col = 1;
            } else {
                pos.col += 1;
            }
        }
        pos
    }

    pub(crate) fn word(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_word_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    pub(crate) fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if self.at_comment() {
                self.skip_comment();
            } else {
                break;
            }
        }
    }

    pub(crate) fn skip_comment(&mut self) {
        let block = self.peek_at(1) == Some('*');
        self.pos += 2;
        while let Some(c) = self.peek() {
            if block && c == '*' && self.peek_at(1) == Some('/') {
                self.pos += 2;
                return;
            }
            if !block && c == '\n' {
                return;
            }
            self.pos += 1;
        }
    }

    pub(crate) fn skip_string(&mut self, quote: char) {
        self.pos += 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => self.pos += 1,
                '\n' => return,
                _ if c == quote => return,
                _ => {}
            }
        }
    }

    pub(crate) fn skip_template(&mut self) {
        self.pos += 1;
        while let Some(c) = self.peek() {
            match c {
                '\\' => self.pos += 2,
                '`' => {
                    self.pos += 1;
                    return;
                }
                '$' if self.peek_at(1) == Some('{') => {
                    self.pos += 2;
                    self.skip_hole();
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Skip a `${ ... }` hole, which may contain nested templates and braces
    fn skip_hole(&mut self) {
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            match c {
                '{' => {
                    depth += 1;
                    self.pos += 1;
                }
                '}' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return;
                    }
                }
                '"' | '\'' => self.skip_string(c),
                '`' => self.skip_template(),
                _ if self.at_comment() => self.skip_comment(),
                _ => self.pos += 1,
            }
        }
    }
}

/// Operators that nest when repeated (`!!!x`, `- - -x`)
const PREFIX_OPERATORS: &[char] = &['!', '~', '+', '-'];

/// Position where brackets or a run of prefix operators nest deeper than `limit`
pub(crate) fn nesting_overflow(source: &str, limit: usize) -> Option<Position> {
    let mut scanner = Scanner::new(source);
    let mut depth = 0usize;
    let mut prefix_run = 0usize;

    while let Some(c) = scanner.peek() {
        if c.is_whitespace() {
            scanner.pos += 1;
            continue;
        }
        if !PREFIX_OPERATORS.contains(&c) {
            prefix_run = 0;
        }
        match c {
            _ if scanner.at_comment() => scanner.skip_comment(),
            '"' | '\'' => scanner.skip_string(c),
            '`' => scanner.skip_template(),
            '{' | '(' | '[' => {
                depth += 1;
                if depth > limit {
                    return Some(scanner.position());
                }
                scanner.pos += 1;
            }
            '}' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                scanner.pos += 1;
            }
            _ if PREFIX_OPERATORS.contains(&c) => {
                prefix_run += 1;
                if depth + prefix_run > limit {
                    return Some(scanner.position());
                }
                scanner.pos += 1;
            }
            _ => scanner.pos += 1,
        }
    }
    None
}
