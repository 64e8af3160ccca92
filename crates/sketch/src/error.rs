use crate::parser::{Span, SyntaxError};
use ariadne::{Config, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The script could not be turned into executable code.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("SyntaxError: {message} ({line}:{column})")]
    Syntax {
        message: String,
        span: Span,
        line: usize,
        column: usize,
    },
}

impl From<SyntaxError> for TransformError {
    fn from(error: SyntaxError) -> Self {
        Self::Syntax {
            message: error.message,
            span: error.span,
            line: error.line,
            column: error.column,
        }
    }
}

impl TransformError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "SyntaxError",
        }
    }

    /// Same shape as a runtime failure so both reach the console identically.
    pub fn to_runtime_error(&self) -> RuntimeError {
        RuntimeError::new(self.kind(), self.to_string().trim_start_matches("SyntaxError: "))
    }

    pub fn report(&self, filename: &str, source: &str) -> String {
        let Self::Syntax { message, span, .. } = self;
        let range = span.into_range();
        let mut buffer = Vec::new();
        let written = Report::build(ReportKind::Error, (filename, range.clone()))
            .with_config(Config::default().with_color(false))
            .with_message(format!("SyntaxError: {message}"))
            .with_label(Label::new((filename, range)).with_message(message.as_str()))
            .finish()
            .write((filename, Source::from(source)), &mut buffer);
        match written {
            Ok(()) => String::from_utf8_lossy(&buffer).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// A value thrown out of the script, or a limit the engine enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub struct RuntimeError {
    pub kind: String,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax_error() -> TransformError {
        TransformError::Syntax {
            message: "Unexpected end of input".to_string(),
            span: Span::from(3..3),
            line: 1,
            column: 4,
        }
    }

    #[test]
    fn syntax_error_reads_like_runtime_error() {
        let error = syntax_error().to_runtime_error();
        assert_eq!(error.kind, "SyntaxError");
        assert_eq!(error.to_string(), "SyntaxError: Unexpected end of input (1:4)");
    }

    #[test]
    fn report_names_file() {
        let report = syntax_error().report("scratch.ts", "1 +");
        assert!(report.contains("scratch.ts"));
        assert!(report.contains("Unexpected end of input"));
    }
}
