//! Places a run's log entries and line results onto source lines.

use crate::output::{LineResult, LogEntry, LogKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// The call a source line must mention to receive a log in aligned mode.
/// Other console methods still log, but claim no line.
const LOG_CALL: &str = "console.log";

/// What one displayed line shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "output", rename_all = "lowercase")]
pub enum LineOutput {
    Log(LogEntry),
    Result(LineResult),
}

impl LineOutput {
    pub fn text(&self) -> String {
        match self {
            Self::Log(entry) => entry.text(),
            Self::Result(result) => result.text(),
        }
    }

    fn color(&self) -> Rgb {
        match self {
            Self::Log(entry) => match entry.kind {
                LogKind::Log => LOG_COLOR,
                LogKind::Error => ERROR_COLOR,
                LogKind::Warn => WARN_COLOR,
                LogKind::Info => VALUE_COLOR,
            },
            Self::Result(result) if result.error.is_some() => ERROR_COLOR,
            Self::Result(_) => VALUE_COLOR,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineView {
    pub lines: BTreeMap<usize, LineOutput>,
    /// Physical lines of the source; the empty source has one.
    pub total_lines: usize,
}

/// Aligned mode puts results on their own line and each log, whatever its
/// kind, on the next unclaimed line that mentions `console.log`. Serial mode stacks logs and
/// then results from line 1 down. A later output replaces an earlier one on
/// the same line.
pub fn correlate(source: &str, logs: &[LogEntry], results: &[LineResult], match_lines: bool) -> LineView {
    let mut view = LineView {
        lines: BTreeMap::new(),
        total_lines: source.split('\n').count(),
    };
    if match_lines {
        let log_lines = source
            .split('\n')
            .enumerate()
            .filter(|(_, text)| text.contains(LOG_CALL))
            .map(|(index, _)| index + 1);
        for (line, entry) in log_lines.zip(logs) {
            view.lines.insert(line, LineOutput::Log(entry.clone()));
        }
        for result in results {
            view.lines.insert(result.line, LineOutput::Result(result.clone()));
        }
    } else {
        let outputs = logs
            .iter()
            .cloned()
            .map(LineOutput::Log)
            .chain(results.iter().cloned().map(LineOutput::Result));
        for (index, output) in outputs.enumerate() {
            view.lines.insert(index + 1, output);
        }
    }
    log::trace!("Correlated {} of {} outputs", view.lines.len(), logs.len() + results.len());
    view
}

impl LineView {
    pub fn get(&self, line: usize) -> Option<&LineOutput> {
        self.lines.get(&line)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line numbers to draw: the whole source, and past it if outputs landed there.
    pub fn height(&self) -> usize {
        let last = self.lines.keys().next_back().copied().unwrap_or(0);
        self.total_lines.max(last)
    }

    pub fn render(&self, options: &RenderOptions<'_>) -> String {
        let source: Vec<&str> = options.source.map(|source| source.split('\n').collect()).unwrap_or_default();
        let source_width = source.iter().map(|line| line.chars().count()).max().unwrap_or(0);
        let number_width = self.height().to_string().len();
        let mut rendered = String::new();
        for line in 1..=self.height() {
            let mut row = String::new();
            if let Some(active) = options.active_line {
                row.push_str(if active == line { "> " } else { "  " });
            }
            if options.line_numbers {
                row.push_str(&format!("{line:>number_width$} "));
            }
            if options.source.is_some() {
                let text = source.get(line - 1).copied().unwrap_or("");
                row.push_str(&format!("{text:<source_width$}  "));
            }
            if let Some(output) = self.get(line) {
                let text = output.text();
                if options.color {
                    let Rgb(red, green, blue) = output.color();
                    row.push_str(&format!("\x1b[38;2;{red};{green};{blue}m{text}\x1b[0m"));
                } else {
                    row.push_str(&text);
                }
            }
            rendered.push_str(row.trim_end());
            rendered.push('\n');
        }
        rendered
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    pub line_numbers: bool,
    /// Source text drawn in a column left of the output.
    pub source: Option<&'a str>,
    pub color: bool,
    pub active_line: Option<usize>,
}

#[derive(Clone, Copy)]
struct Rgb(u8, u8, u8);

// #d54e53
const ERROR_COLOR: Rgb = Rgb(0xd5, 0x4e, 0x53);
// #e78c45
const WARN_COLOR: Rgb = Rgb(0xe7, 0x8c, 0x45);
// #7aa6da
const VALUE_COLOR: Rgb = Rgb(0x7a, 0xa6, 0xda);
// #b9ca4a
const LOG_COLOR: Rgb = Rgb(0xb9, 0xca, 0x4a);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CapturedValue;

    fn log(text: &str) -> LogEntry {
        LogEntry::new(LogKind::Log, vec![CapturedValue::String(text.to_string())])
    }

    fn result(line: usize, value: f64) -> LineResult {
        LineResult {
            line,
            value: CapturedValue::Number(value),
            error: None,
        }
    }

    fn texts(view: &LineView) -> Vec<(usize, String)> {
        view.lines.iter().map(|(line, output)| (*line, output.text())).collect()
    }

    #[test]
    fn serial_mode_stacks_logs_then_results() {
        let view = correlate("a\nb\nc\nd\ne", &[log("a")], &[result(5, 10.0)], false);
        assert_eq!(texts(&view), vec![(1, "'a'".to_string()), (2, "10".to_string())]);
        assert_eq!(view.total_lines, 5);
    }

    #[test]
    fn aligned_mode_follows_console_calls() {
        let source = "console.log('x')\nconst y = 1\ny";
        let view = correlate(source, &[log("x")], &[result(3, 1.0)], true);
        assert_eq!(texts(&view), vec![(1, "'x'".to_string()), (3, "1".to_string())]);
    }

    #[test]
    fn surplus_logs_are_dropped_from_the_view() {
        let source = "for (const i of [1, 2]) console.log(i)";
        let view = correlate(source, &[log("1"), log("2")], &[], true);
        assert_eq!(texts(&view), vec![(1, "'1'".to_string())]);
    }

    #[test]
    fn only_console_log_lines_receive_logs() {
        let source = "console.error('a')\nconsole.log('b')\nconsole.warn('c')";
        let entry = |kind, text: &str| LogEntry::new(kind, vec![CapturedValue::String(text.to_string())]);
        let logs = [entry(LogKind::Error, "a"), entry(LogKind::Log, "b"), entry(LogKind::Warn, "c")];
        let view = correlate(source, &logs, &[], true);
        assert_eq!(texts(&view), vec![(2, "'a'".to_string())]);
        let serial = correlate(source, &logs, &[], false);
        assert_eq!(serial.lines.len(), 3);
    }

    #[test]
    fn results_win_over_logs_on_the_same_line() {
        let source = "console.log('w') || 3";
        let view = correlate(source, &[log("w")], &[result(1, 3.0)], true);
        assert_eq!(texts(&view), vec![(1, "3".to_string())]);
    }

    #[test]
    fn later_results_overwrite_earlier_ones() {
        let view = correlate("x", &[], &[result(1, 1.0), result(1, 2.0)], true);
        assert_eq!(texts(&view), vec![(1, "2".to_string())]);
    }

    #[test]
    fn empty_source_has_one_line() {
        let view = correlate("", &[], &[], true);
        assert_eq!(view.total_lines, 1);
        assert!(view.is_empty());
        assert_eq!(view.render(&RenderOptions::default()), "\n");
    }

    #[test]
    fn renders_numbers_source_and_output() {
        let source = "const a = 1\na";
        let view = correlate(source, &[], &[result(2, 1.0)], true);
        let rendered = view.render(&RenderOptions {
            line_numbers: true,
            source: Some(source),
            ..RenderOptions::default()
        });
        assert_eq!(rendered, "1 const a = 1\n2 a            1\n");
    }

    #[test]
    fn colors_by_kind() {
        let entry = LogEntry::new(LogKind::Error, vec![CapturedValue::String("bad".to_string())]);
        let view = correlate("console.log(risky())", &[entry], &[], true);
        let rendered = view.render(&RenderOptions {
            color: true,
            ..RenderOptions::default()
        });
        assert_eq!(rendered, "\x1b[38;2;213;78;83m'bad'\x1b[0m\n");
    }

    #[test]
    fn serial_output_past_the_source_is_drawn() {
        let view = correlate("x", &[log("a"), log("b")], &[], false);
        assert_eq!(view.height(), 2);
        assert_eq!(view.render(&RenderOptions::default()), "'a'\n'b'\n");
    }
}
