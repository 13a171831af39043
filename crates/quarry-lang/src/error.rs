//! Error types for parsing and checking predicate expressions.

use crate::span::{line_col, Span};
use quarry_model::ShapeMismatchError;
use thiserror::Error;

/// A syntax or type error at a known place in the expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// Optional hint for fixing the error.
    pub hint: Option<String>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (start, end) = (self.span.start, self.span.end);
        write!(f, "{} at {start}..{end}", self.message)
    }
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Render the error under the offending source line.
    pub fn format_with_source(&self, source: &str) -> String {
        render(&self.message, self.span, self.hint.as_deref(), source)
    }
}

fn render(message: &str, span: Span, hint: Option<&str>, source: &str) -> String {
    let (line, col) = line_col(source, span.start);
    let mut out = format!("error: {message}\n  --> line {line}:{col}\n");

    if let Some(text) = source.lines().nth(line - 1) {
        out.push_str(&format!("   |\n{line:3}| {text}\n   | "));
        out.push_str(&" ".repeat(col - 1));
        out.push('^');
        let room = text.chars().count().saturating_sub(col);
        let width = span.len().saturating_sub(1).min(room);
        out.push_str(&"~".repeat(width));
        out.push('\n');
    }

    if let Some(hint) = hint {
        out.push_str(&format!("   = hint: {hint}\n"));
    }
    out
}

/// Errors raised while turning expression text into a predicate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslationError {
    /// The text does not parse, or does not type-check against the shape.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The expression is well-formed but not a non-nullable boolean.
    #[error("expression has type '{found}', expected a non-nullable boolean")]
    NotBoolean { found: String, span: Span },

    /// An expression written for one shape cannot read another.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(#[from] ShapeMismatchError),
}

impl TranslationError {
    /// Render with source context when the error carries a span.
    pub fn format_with_source(&self, source: &str) -> String {
        match self {
            TranslationError::Parse(e) => e.format_with_source(source),
            TranslationError::NotBoolean { span, .. } => render(
                &self.to_string(),
                *span,
                Some("a filter must evaluate to true or false"),
                source,
            ),
            TranslationError::ShapeMismatch(e) => format!("error: {e}\n"),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            TranslationError::Parse(e) => Some(e.span),
            TranslationError::NotBoolean { span, .. } => Some(*span),
            TranslationError::ShapeMismatch(_) => None,
        }
    }
}
