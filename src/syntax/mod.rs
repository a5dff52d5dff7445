pub mod ast;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod visit;

use ast::Block;
use span::{LineIndex, Position, Span};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lexer/parser failure before it has been placed on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawError {
    pub message: String,
    pub offset: usize,
}

/// Malformed source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{}: {message}", .position.line, .position.column)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
    pub position: Position,
}

/// The text of one script. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    path: PathBuf,
    text: String,
    lines: LineIndex,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = LineIndex::new(&text);
        Self {
            path: path.into(),
            text,
            lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn position(&self, offset: usize) -> Position {
        self.lines.position(&self.text, offset)
    }

    pub fn slice(&self, span: Span) -> Option<&str> {
        self.text.get(span.start..span.end)
    }

    /// Text of a 1-based line without its terminator.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = self.lines.line_start(line)?;
        let rest = &self.text[start..];
        let end = rest.find('\n').unwrap_or(rest.len());
        Some(rest[..end].trim_end_matches('\r'))
    }

    /// Leading whitespace of the line containing `offset`.
    pub fn indent_at(&self, offset: usize) -> &str {
        let line = self.position(offset).line;
        let text = self.line_text(line).unwrap_or("");
        let trimmed = text.trim_start_matches([' ', '\t']);
        &text[..text.len() - trimmed.len()]
    }

    /// Terminator of the line containing `offset`, so inserted lines match
    /// the file. A last line without one follows the rest of the file.
    pub fn line_ending_at(&self, offset: usize) -> &'static str {
        let rest = self.text.get(offset..).unwrap_or("");
        let crlf = match rest.find('\n') {
            Some(i) => rest[..i].ends_with('\r'),
            None => self.text.contains("\r\n"),
        };
        if crlf {
            "\r\n"
        } else {
            "\n"
        }
    }

    pub fn parse(&self) -> Result<Block, ParseError> {
        parser::parse_chunk(&self.text).map_err(|raw| ParseError {
            position: self.position(raw.offset),
            message: raw.message,
            offset: raw.offset,
        })
    }
}
