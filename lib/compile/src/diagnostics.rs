use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFile,
    term::{
        self,
        termcolor::{self, WriteColor},
    },
};
use std::{io, ops::Range};
use thiserror::Error;

pub type Spanned<T> = (T, Span);
pub type Span = Range<usize>;

pub type LocatableError = Spanned<CompileError>;
pub type LocatableResult<T, E = LocatableError> = std::result::Result<T, E>;

macro_rules! impl_from {
    ($($error:tt),+) => {$(
        impl From<$error> for CompileError {
            fn from(e: $error) -> Self {
                CompileError::$error(e)
            }
        }
    )+};
}

impl_from!(SyntaxError, TypeError);

pub trait ToDiagnostic {
    fn to_diagnostic(&self, span: &Span) -> Diagnostic<()>;
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CompileError {
    #[error("SyntaxError: {0}")]
    SyntaxError(SyntaxError),
    #[error("TypeError: {0}")]
    TypeError(TypeError),
}

impl ToDiagnostic for CompileError {
    fn to_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        match self {
            CompileError::SyntaxError(e) => e.to_diagnostic(span),
            CompileError::TypeError(e) => e.to_diagnostic(span),
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SyntaxError {
    #[error("unexpected token: {token:?} expected: {expected:?}")]
    UnexpectedToken {
        token: String,
        expected: Vec<String>,
    },
    #[error("Unterminated string literal. Expected a closing quote (').")]
    UnterminatedString,
    #[error("invalid token {token:?}: {reason}")]
    InvalidToken { token: String, reason: String },
    #[error("unexpected end of input")]
    UnexpectedEOF { expected: Vec<String> },
    #[error("empty statement")]
    EmptyStatement,
    #[error("{columns} column(s) but {values} value(s)")]
    ValueCountMismatch { columns: usize, values: usize },
    #[error("column {0:?} is listed more than once")]
    DuplicateColumn(String),
}

impl ToDiagnostic for SyntaxError {
    fn to_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        let mut diagnostic = Diagnostic::error()
            .with_code("Syntax Error: ")
            .with_message(self.to_string())
            .with_labels(vec![Label::primary((), span.clone())]);
        match self {
            SyntaxError::UnexpectedEOF { expected, .. }
            | SyntaxError::UnexpectedToken { expected, .. } => {
                diagnostic = diagnostic.with_notes(vec![format!("expected: {}", one_of(expected))]);
            }
            SyntaxError::UnterminatedString => {
                diagnostic = diagnostic.with_notes(vec![String::from("expected: '")]);
            }
            _ => {}
        };
        diagnostic
    }
}

fn one_of(strings: &[String]) -> String {
    let mut result = String::new();
    for (i, string) in strings.iter().enumerate() {
        if i > 0 {
            result.push_str(", ");
        }

        if i > 0 && i == strings.len() - 1 {
            result.push_str("or ");
        }
        result.push_str(string);
    }
    result
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TypeError {
    #[error("unknown data type {name:?}")]
    UnknownDataType { name: String },
}

impl ToDiagnostic for TypeError {
    fn to_diagnostic(&self, span: &Span) -> Diagnostic<()> {
        Diagnostic::error()
            .with_code("Type Error: ")
            .with_message(self.to_string())
            .with_labels(vec![Label::primary((), span.clone())])
            .with_notes(vec![String::from(
                "expected: INT, FLOAT, BOOL or TEXT (and their common aliases)",
            )])
    }
}

pub fn report_errors(
    writer: &mut impl io::Write,
    source: &str,
    errors: &[LocatableError],
) -> io::Result<()> {
    let mut buffer = termcolor::Buffer::ansi();
    for err in errors {
        report_error(&mut buffer, source, err)?;
    }
    writer.write_all(buffer.as_slice())
}

pub fn report_error(
    writer: &mut impl WriteColor,
    source: &str,
    (error, span): &LocatableError,
) -> io::Result<()> {
    let file = SimpleFile::new("<query>", source);
    let config = term::Config::default();
    let diagnostic = error.to_diagnostic(span);

    term::emit(writer, &config, &file, &diagnostic)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

/// Renders the diagnostic for `error` without colors, e.g. for a remote client.
pub fn render_plain(source: &str, error: &LocatableError) -> String {
    let mut buffer = termcolor::Buffer::no_color();
    match report_error(&mut buffer, source, error) {
        Ok(()) => String::from_utf8_lossy(buffer.as_slice()).into_owned(),
        Err(_) => error.0.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_of() {
        assert_eq!(one_of(&["a".to_string()]), "a");
        assert_eq!(
            one_of(&["a".to_string(), "b".to_string(), "c".to_string()]),
            "a, b, or c"
        );
    }

    #[test]
    fn test_render_plain_points_at_span() {
        let source = "SELECT * FROM";
        let error = (
            CompileError::SyntaxError(SyntaxError::UnexpectedEOF {
                expected: vec!["identifier".to_string()],
            }),
            13..13,
        );

        let rendered = render_plain(source, &error);
        assert!(rendered.contains("unexpected end of input"));
        assert!(rendered.contains("expected: identifier"));
        assert!(rendered.contains("<query>"));
    }
}
