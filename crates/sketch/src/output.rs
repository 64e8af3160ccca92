//! Data that leaves the sandbox: log entries, captured line values and the
//! outcome of one run. Everything here is plain data and serializes with serde.

use crate::error::RuntimeError;
use crate::parser::number_to_string;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Log,
    Error,
    Warn,
    Info,
}

impl LogKind {
    pub const ALL: [Self; 4] = [Self::Log, Self::Error, Self::Warn, Self::Info];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Ulid,
    pub kind: LogKind,
    pub values: Vec<CapturedValue>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl LogEntry {
    pub fn new(kind: LogKind, values: Vec<CapturedValue>) -> Self {
        Self {
            id: Ulid::new(),
            kind,
            values,
            timestamp: now_millis(),
        }
    }

    /// The single error entry a failed run ends with.
    pub fn failure(error: &RuntimeError) -> Self {
        Self::new(LogKind::Error, vec![CapturedValue::String(error.to_string())])
    }

    /// Values formatted and joined by single spaces.
    pub fn text(&self) -> String {
        self.values
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineResult {
    /// 1-based source line.
    pub line: usize,
    pub value: CapturedValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LineResult {
    pub fn text(&self) -> String {
        match &self.error {
            Some(error) => error.clone(),
            None => format_value(&self.value),
        }
    }
}

/// A snapshot of a script value taken when it crossed the sandbox boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CapturedValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Symbol(String),
    /// Source text of the function.
    Function(String),
    /// JSON text, or the `String()` form when the value has no JSON form.
    Object(String),
}

impl fmt::Display for CapturedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Boolean(boolean) => write!(f, "{boolean}"),
            Self::Number(number) => f.write_str(&number_to_string(*number)),
            Self::String(string) => write!(f, "'{string}'"),
            Self::Symbol(description) => f.write_str(description),
            Self::Function(source) | Self::Object(source) => f.write_str(source),
        }
    }
}

/// How the console shows `value`: strings quoted, objects as JSON text.
pub fn format_value(value: &CapturedValue) -> String {
    value.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub results: Vec<LineResult>,
    pub logs: Vec<LogEntry>,
    /// Timers and promise reactions registered by the script and dropped with the run.
    pub discarded_timers: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RuntimeError>,
}

impl ExecutionOutcome {
    /// An outcome holding nothing but the failure entry.
    pub fn failed(error: RuntimeError) -> Self {
        Self {
            results: Vec::new(),
            logs: vec![LogEntry::failure(&error)],
            discarded_timers: 0,
            failure: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_values_format_like_the_console() {
        assert_eq!(CapturedValue::Undefined.to_string(), "undefined");
        assert_eq!(CapturedValue::Null.to_string(), "null");
        assert_eq!(CapturedValue::String("quoted".into()).to_string(), "'quoted'");
        assert_eq!(CapturedValue::Number(-0.0).to_string(), "0");
        assert_eq!(CapturedValue::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(CapturedValue::Object(r#"{"a":1}"#.into()).to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn failure_entry_carries_kind_and_message() {
        let outcome = ExecutionOutcome::failed(RuntimeError::new("TypeError", "x is not a function"));
        assert_eq!(outcome.logs.len(), 1);
        assert_eq!(outcome.logs[0].kind, LogKind::Error);
        assert_eq!(outcome.logs[0].text(), "'TypeError: x is not a function'");
    }

    #[test]
    fn serializes_with_lowercase_tags() {
        let entry = LogEntry::new(LogKind::Warn, vec![CapturedValue::Number(1.0)]);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "warn");
        assert_eq!(json["values"][0]["type"], "number");
    }
}
