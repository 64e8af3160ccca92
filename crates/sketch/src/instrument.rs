//! Source-to-source rewriting that makes a script report its own values.
//!
//! Stage one erases type syntax, stage two appends a capture statement for
//! every naked top-level expression. Line numbers survive both stages.

use crate::error::TransformError;
use crate::parser::parse_program;
use serde::Serialize;

pub mod capture;
pub mod erase;

/// Array the instrumented code collects `{ line, value }` records into.
pub const RESULTS_IDENTIFIER: &str = "__RESULTS__";
/// Calls on this object are logged, not captured.
pub const CONSOLE_IDENTIFIER: &str = "console";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentedSource {
    pub code: String,
    /// Number of capture statements injected.
    pub captures: usize,
    /// Why capture injection was skipped, if it was.
    pub degraded: Option<String>,
}

pub fn instrument(source: &str) -> Result<InstrumentedSource, TransformError> {
    let erased = erase_types(source)?;
    log::debug!("Erased types ({} bytes)", erased.len());

    match capture::inject(&erased) {
        Ok(injected) => {
            log::debug!("Injected {} capture statements", injected.captures);
            Ok(InstrumentedSource {
                code: injected.code,
                captures: injected.captures,
                degraded: None,
            })
        }
        Err(error) => {
            log::warn!("Capture injection skipped: {error}");
            Ok(InstrumentedSource {
                code: erased,
                captures: 0,
                degraded: Some(error.to_string()),
            })
        }
    }
}

/// Stage one only: the script with all type syntax blanked out.
pub fn erase_types(source: &str) -> Result<String, TransformError> {
    let program = parse_program(source).map_err(|errors| {
        let error = errors.into_iter().next();
        match error {
            Some(error) => TransformError::from(error),
            None => TransformError::Syntax {
                message: "Invalid or unexpected token".to_string(),
                span: (0..0).into(),
                line: 1,
                column: 1,
            },
        }
    })?;
    Ok(erase::erase(source, &program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_keeps_user_lines() {
        let source = "const nums: number[] = [1, 2, 3]\nnums.map((n: number) => n * 2)\nconsole.log(nums)\nnums.length";
        let instrumented = instrument(source).unwrap();
        assert_eq!(instrumented.captures, 2);
        assert!(instrumented.degraded.is_none());
        let lines = instrumented.code.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("const __RESULTS__ = [];const nums"));
        assert_eq!(lines[3], "nums.length");
        assert_eq!(lines[4], "__RESULTS__.push({ line: 2, value: (nums.map((n        ) => n * 2)) });");
        assert_eq!(lines[5], "__RESULTS__.push({ line: 4, value: (nums.length) });");
        assert_eq!(lines[6], "return __RESULTS__;");
    }

    #[test]
    fn instrument_is_idempotent() {
        let once = instrument("1 + 1\n'two'").unwrap();
        let twice = instrument(&once.code).unwrap();
        assert_eq!(once.code, twice.code);
        assert_eq!(twice.captures, 2);
    }

    #[test]
    fn instrumented_looking_code_is_still_validated() {
        let error = instrument("const __RESULTS__ = [];const = 1\nreturn __RESULTS__;").unwrap_err();
        assert!(error.to_string().starts_with("SyntaxError:"));
        let typed = instrument("const __RESULTS__ = [];let n: number = 1\nreturn __RESULTS__;").unwrap();
        assert!(typed.code.contains("let n         = 1"));
    }

    #[test]
    fn syntax_errors_carry_position() {
        let error = instrument("const a = 1\nconst = 2").unwrap_err();
        let TransformError::Syntax { line, .. } = &error;
        assert_eq!(*line, 2);
        assert!(error.to_string().starts_with("SyntaxError:"));
    }
}
