//! One editing session: the live outcome and the view derived from it.

use crate::config::{DisplaySettings, PlaygroundConfig};
use crate::correlate::{LineView, correlate};
use crate::instrument::instrument;
use crate::output::{ExecutionOutcome, LogEntry};
use crate::sandbox::Sandbox;

pub struct Playground {
    sandbox: Sandbox,
    settings: DisplaySettings,
    source: String,
    outcome: ExecutionOutcome,
    view: LineView,
    diagnostics: Option<String>,
}

impl Playground {
    pub fn new(config: &PlaygroundConfig) -> Self {
        Self {
            sandbox: Sandbox::new(config.sandbox),
            settings: config.display.clone(),
            source: String::new(),
            outcome: ExecutionOutcome::default(),
            view: correlate("", &[], &[], config.display.match_lines),
            diagnostics: None,
        }
    }

    pub fn run(&mut self, source: &str) -> &LineView {
        self.run_with(source, &mut |_| {})
    }

    /// Replaces the previous outcome with a fresh run of `source`.
    /// Transform failures end up in the outcome like runtime failures.
    pub fn run_with(&mut self, source: &str, on_log: &mut dyn FnMut(&LogEntry)) -> &LineView {
        self.source = source.to_string();
        self.clear();
        self.outcome = match instrument(source) {
            Ok(instrumented) => {
                self.diagnostics = instrumented.degraded.clone();
                self.sandbox.run(&instrumented, on_log)
            }
            Err(error) => {
                log::debug!("Transform failed: {error}");
                let outcome = ExecutionOutcome::failed(error.to_runtime_error());
                outcome.logs.iter().for_each(|entry| on_log(entry));
                outcome
            }
        };
        self.correlate();
        &self.view
    }

    /// Drops the logs and results of the last run.
    pub fn clear(&mut self) {
        self.outcome = ExecutionOutcome::default();
        self.diagnostics = None;
        self.correlate();
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn outcome(&self) -> &ExecutionOutcome {
        &self.outcome
    }

    pub fn view(&self) -> &LineView {
        &self.view
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    /// Applies `settings` to the current outcome without running again.
    pub fn set_settings(&mut self, settings: DisplaySettings) {
        self.settings = settings;
        self.correlate();
    }

    /// Why the last run skipped capture injection, if it did.
    pub fn diagnostics(&self) -> Option<&str> {
        self.diagnostics.as_deref()
    }

    fn correlate(&mut self) {
        self.view = correlate(
            &self.source,
            &self.outcome.logs,
            &self.outcome.results,
            self.settings.match_lines,
        );
    }
}

impl Default for Playground {
    fn default() -> Self {
        Self::new(&PlaygroundConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::LogKind;

    #[test]
    fn syntax_errors_replace_the_previous_run() {
        let mut playground = Playground::default();
        playground.run("1 + 1\nconsole.log('hi')");
        assert_eq!(playground.outcome().results.len(), 1);

        playground.run("1 +");
        let outcome = playground.outcome();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.logs.len(), 1);
        assert_eq!(outcome.logs[0].kind, LogKind::Error);
        assert!(outcome.logs[0].text().starts_with("'SyntaxError:"));
    }

    #[test]
    fn settings_recorrelate_without_running() {
        let mut playground = Playground::default();
        playground.run("const a = 2\n\na * 3");
        assert_eq!(playground.view().get(3).map(|output| output.text()), Some("6".to_string()));

        let settings = DisplaySettings {
            match_lines: false,
            ..playground.settings().clone()
        };
        playground.set_settings(settings);
        assert_eq!(playground.view().get(1).map(|output| output.text()), Some("6".to_string()));
        assert!(playground.view().get(3).is_none());
    }

    #[test]
    fn clear_keeps_the_source_lines() {
        let mut playground = Playground::default();
        playground.run("1\n2\n3");
        playground.clear();
        assert!(playground.view().is_empty());
        assert_eq!(playground.view().total_lines, 3);
        assert!(playground.outcome().logs.is_empty());
    }

    #[test]
    fn streams_logs_while_running() {
        let mut playground = Playground::default();
        let mut streamed = Vec::new();
        playground.run_with("console.log('a')\nconsole.error('b')", &mut |entry| streamed.push(entry.kind));
        assert_eq!(streamed, vec![LogKind::Log, LogKind::Error]);
        assert!(playground.diagnostics().is_none());
    }
}
