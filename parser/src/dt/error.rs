//! Accumulated parse diagnostics and their terminal rendering.

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// One diagnostic from the lexer, parser or extractor. These are accumulated
/// on the result, never thrown; parsing always runs to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
}

impl ParseError {
    pub fn error(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{tag}: {} at {}:{}", self.message, self.line, self.column)
    }
}

/// Pretty, source-annotated rendering of a [`ParseError`] for terminals.
#[derive(Error, Debug, Diagnostic)]
#[error("{message}")]
#[diagnostic()]
pub struct DtDiagnostic {
    pub message: String,
    #[source_code]
    pub src: NamedSource,
    #[label("here")]
    pub err_span: SourceSpan,
    #[help]
    pub help_msg: Option<String>,
}

/// Attach file name and content to a diagnostic so miette can render the
/// offending line.
pub fn diagnostic_for(error: &ParseError, file_name: &str, source: &str) -> DtDiagnostic {
    let offset = offset_of(source, error.line, error.column);
    DtDiagnostic {
        message: error.message.clone(),
        src: NamedSource::new(file_name, source.to_string()),
        err_span: SourceSpan::new(offset.into(), 1.into()),
        help_msg: match error.severity {
            Severity::Warning => Some("this is a warning; parsing continued".to_string()),
            Severity::Error => None,
        },
    }
}

fn offset_of(source: &str, line: usize, column: usize) -> usize {
    let mut current = 1;
    let mut offset = 0;
    for l in source.split_inclusive('\n') {
        if current == line {
            return offset + column.saturating_sub(1).min(l.len());
        }
        offset += l.len();
        current += 1;
    }
    offset.min(source.len())
}
