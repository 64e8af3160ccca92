//! Runs instrumented code once inside a capability-limited interpreter.
//!
//! Each run gets a fresh realm, heap and timer queue. Nothing survives it:
//! pending timers and promise reactions are counted and dropped, and every
//! object the run allocated is severed from the others once the outcome has
//! been captured.

use crate::error::RuntimeError;
use crate::instrument::InstrumentedSource;
use crate::output::{ExecutionOutcome, LineResult, LogEntry};
use crate::parser::parse_program;
use interpreter::{Interpreter, Interrupt};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use value::{ObjectKind, PropertyKey, Value};

mod builtins;
mod environment;
mod format;
mod interpreter;
mod operations;
mod realm;
mod scope;
mod timers;
mod value;

pub use environment::CAPABILITIES;

/// Deep recursion in the evaluator needs more than the default thread stack.
const STACK_SIZE: usize = 128 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Evaluation steps before the run is halted.
    pub max_steps: u64,
    /// Nested calls before a `RangeError` is thrown.
    pub max_call_depth: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_steps: 100_000_000,
            max_call_depth: 128,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// Executes `instrumented` and returns what it produced.
    ///
    /// `on_log` sees every entry as soon as the script emits it, including
    /// the error entry a failed run ends with. It is not called after this
    /// returns.
    pub fn run(&self, instrumented: &InstrumentedSource, on_log: &mut dyn FnMut(&LogEntry)) -> ExecutionOutcome {
        let limits = self.limits;
        let code = instrumented.code.as_str();
        let (sender, receiver) = mpsc::channel::<LogEntry>();
        std::thread::scope(|scope| {
            let worker = std::thread::Builder::new()
                .name("sketch-sandbox".to_string())
                .stack_size(STACK_SIZE)
                .spawn_scoped(scope, move || {
                    let mut forward = |entry: &LogEntry| {
                        let _ = sender.send(entry.clone());
                    };
                    execute(code, limits, &mut forward)
                });
            let worker = match worker {
                Ok(worker) => worker,
                Err(error) => {
                    log::warn!("Failed to spawn the sandbox thread, running inline: {error}");
                    return execute(code, limits, on_log);
                }
            };
            let mut forwarded = Vec::new();
            for entry in receiver.iter() {
                on_log(&entry);
                forwarded.push(entry);
            }
            match worker.join() {
                Ok(outcome) => outcome,
                Err(_) => {
                    log::error!("The sandbox thread panicked");
                    crashed(forwarded, on_log)
                }
            }
        })
    }
}

/// Outcome of a run whose interpreter died: the entries it already streamed,
/// then the crash.
fn crashed(mut forwarded: Vec<LogEntry>, on_log: &mut dyn FnMut(&LogEntry)) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::failed(RuntimeError::new("Error", "Interpreter crashed"));
    outcome.logs.iter().for_each(|entry| on_log(entry));
    forwarded.append(&mut outcome.logs);
    outcome.logs = forwarded;
    outcome
}

fn execute(code: &str, limits: SandboxLimits, sink: &mut dyn FnMut(&LogEntry)) -> ExecutionOutcome {
    let program = match parse_program(code) {
        Ok(program) => program,
        Err(errors) => {
            let message = errors
                .into_iter()
                .next()
                .map(|error| error.message)
                .unwrap_or_else(|| "Invalid or unexpected token".to_string());
            let outcome = ExecutionOutcome::failed(RuntimeError::new("SyntaxError", message));
            outcome.logs.iter().for_each(|entry| sink(entry));
            return outcome;
        }
    };

    let mut interpreter = Interpreter::new(code, limits, sink);
    let returned = match interpreter.run(&program) {
        Ok(value) => Ok(value),
        Err(Interrupt::Suspend) => {
            log::debug!("Run suspended on a promise that never settles");
            interpreter.pending_reactions += 1;
            Ok(Value::Undefined)
        }
        Err(Interrupt::Throw(thrown)) => Err(interpreter.runtime_error(&thrown)),
        Err(Interrupt::Halt(error)) => Err(error),
    };
    log::debug!("Executed in {} steps", interpreter.steps());

    let discarded_timers = interpreter.timers.discard() + interpreter.pending_reactions;
    if discarded_timers > 0 {
        log::debug!("Discarded {discarded_timers} pending timers and reactions");
    }

    let outcome = match returned {
        Ok(value) => {
            let results = collect_results(&mut interpreter, &value);
            ExecutionOutcome {
                results,
                logs: std::mem::take(&mut interpreter.logs),
                discarded_timers,
                failure: None,
            }
        }
        Err(error) => {
            log::debug!("Run failed with {error}");
            interpreter.emit(LogEntry::failure(&error));
            ExecutionOutcome {
                results: Vec::new(),
                logs: std::mem::take(&mut interpreter.logs),
                discarded_timers,
                failure: Some(error),
            }
        }
    };
    log::trace!("Releasing {} live objects", interpreter.heap.live());
    interpreter.heap.release();
    outcome
}

/// Keeps the entries shaped like `{ line, value }` with a positive integer line.
fn collect_results(interpreter: &mut Interpreter<'_>, returned: &Value) -> Vec<LineResult> {
    let Some(array) = returned.as_object() else {
        return Vec::new();
    };
    let entries = match &array.borrow().kind {
        ObjectKind::Array(entries) => entries.clone(),
        _ => return Vec::new(),
    };
    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(object) = entry.as_object() else {
            continue;
        };
        if !object.borrow().has_own(&PropertyKey::from("value")) {
            continue;
        }
        let line = match interpreter.get_named(&entry, "line") {
            Ok(Value::Number(line)) if line >= 1.0 && line.fract() == 0.0 && line <= usize::MAX as f64 => {
                line as usize
            }
            _ => continue,
        };
        let value = match interpreter.get_named(&entry, "value") {
            Ok(value) => interpreter.capture(&value),
            Err(_) => continue,
        };
        let error = match interpreter.get_named(&entry, "error") {
            Ok(Value::String(error)) => Some(error.to_string()),
            _ => None,
        };
        results.push(LineResult { line, value, error });
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::instrument;
    use crate::output::{CapturedValue, LogKind};

    fn run(source: &str) -> ExecutionOutcome {
        let instrumented = instrument(source).unwrap();
        Sandbox::default().run(&instrumented, &mut |_| {})
    }

    fn lines(outcome: &ExecutionOutcome) -> Vec<(usize, String)> {
        outcome
            .results
            .iter()
            .map(|result| (result.line, result.text()))
            .collect()
    }

    fn failure(outcome: &ExecutionOutcome) -> String {
        outcome.failure.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    #[test]
    fn captures_every_naked_expression() {
        let outcome = run("const a = 1\na + 1\n'x'\nconsole.log(a)");
        assert_eq!(lines(&outcome), vec![(2, "2".to_string()), (3, "'x'".to_string())]);
        assert_eq!(outcome.logs.len(), 1);
        assert!(!outcome.is_failure());
    }

    #[test]
    fn captured_values_reflect_the_final_state() {
        let outcome = run("let n = 1\nn\nn = 5");
        assert_eq!(lines(&outcome), vec![(2, "5".to_string())]);
    }

    #[test]
    fn objects_and_functions_are_snapshotted() {
        let outcome = run("({ a: [1, 'b'] })\nconst double = (x) => x * 2\ndouble");
        assert_eq!(outcome.results[0].value, CapturedValue::Object(r#"{"a":[1,"b"]}"#.to_string()));
        assert_eq!(outcome.results[1].value, CapturedValue::Function("(x) => x * 2".to_string()));
    }

    #[test]
    fn logs_stream_in_call_order() {
        let instrumented = instrument("console.log(1)\nconsole.warn('w', 2)\nconsole.info()").unwrap();
        let mut streamed = Vec::new();
        let outcome = Sandbox::default().run(&instrumented, &mut |entry| streamed.push(entry.clone()));
        assert_eq!(streamed, outcome.logs);
        let kinds: Vec<_> = outcome.logs.iter().map(|entry| entry.kind).collect();
        assert_eq!(kinds, vec![LogKind::Log, LogKind::Warn, LogKind::Info]);
        assert_eq!(outcome.logs[1].text(), "'w' 2");
    }

    #[test]
    fn thrown_errors_end_the_run() {
        let outcome = run("console.log('before')\n1\nnull.x");
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.logs.len(), 2);
        assert_eq!(outcome.logs[1].kind, LogKind::Error);
        assert!(failure(&outcome).starts_with("TypeError: "));
    }

    #[test]
    fn thrown_values_name_their_constructor() {
        assert_eq!(failure(&run("throw new RangeError('too far')")), "RangeError: too far");
        assert_eq!(failure(&run("throw null")), "Error: Unknown error");
        assert_eq!(failure(&run("throw 'boom'")), "String: Unknown error");
        assert_eq!(
            failure(&run("class Oops extends Error {}\nthrow new Oops('bad')")),
            "Oops: bad"
        );
    }

    fn run_with_steps(source: &str, max_steps: u64) -> ExecutionOutcome {
        let instrumented = instrument(source).unwrap();
        let sandbox = Sandbox::new(SandboxLimits {
            max_steps,
            ..SandboxLimits::default()
        });
        sandbox.run(&instrumented, &mut |_| {})
    }

    #[test]
    fn step_limit_halts_infinite_loops() {
        let outcome = run_with_steps("while (true) {}", 10_000);
        assert_eq!(failure(&outcome), "RangeError: Execution step limit exceeded");
        assert_eq!(
            outcome.logs.last().map(LogEntry::text),
            Some("'RangeError: Execution step limit exceeded'".to_string())
        );
    }

    #[test]
    fn step_limit_cannot_be_caught() {
        let outcome = run_with_steps("try { while (true) {} } finally { console.log('cleanup') }\n1", 10_000);
        assert_eq!(failure(&outcome), "RangeError: Execution step limit exceeded");
        assert_eq!(outcome.logs.len(), 1);
        let outcome = run_with_steps("try { while (true) {} } catch (e) {}\n1", 10_000);
        assert_eq!(failure(&outcome), "RangeError: Execution step limit exceeded");
    }

    #[test]
    fn long_loops_fit_the_default_budget() {
        let outcome = run("let total = 0\nfor (let i = 0; i < 1000000; i++) total += i\ntotal");
        assert_eq!(failure(&outcome), "");
        assert_eq!(lines(&outcome), vec![(3, "499999500000".to_string())]);
    }

    #[test]
    fn deep_recursion_throws_a_catchable_range_error() {
        let outcome = run("function f() { return f() }\nlet caught\ntry { f() } catch (e) { caught = e.message }\ncaught");
        assert_eq!(lines(&outcome), vec![(4, "'Maximum call stack size exceeded'".to_string())]);
    }

    #[test]
    fn limits_are_configurable() {
        let instrumented = instrument("let i = 0\nwhile (i < 100) i++\ni").unwrap();
        let sandbox = Sandbox::new(SandboxLimits {
            max_steps: 50,
            ..SandboxLimits::default()
        });
        assert!(sandbox.run(&instrumented, &mut |_| {}).is_failure());
        assert!(!Sandbox::default().run(&instrumented, &mut |_| {}).is_failure());
    }

    #[test]
    fn host_names_are_unreachable() {
        let outcome = run("typeof process\ntypeof require\ntypeof globalThis\ntypeof Math");
        let texts: Vec<_> = outcome.results.iter().map(LineResult::text).collect();
        assert_eq!(texts, vec!["'undefined'", "'undefined'", "'undefined'", "'object'"]);
    }

    #[test]
    fn timers_and_reactions_are_discarded() {
        let outcome = run(
            "const timeout = setTimeout(() => console.log('late'), 0)\nconst interval = setInterval(() => {}, 10)\nconst then = Promise.resolve(1).then((x) => x)",
        );
        assert_eq!(outcome.discarded_timers, 3);
        assert!(outcome.logs.is_empty());
    }

    #[test]
    fn captured_expressions_run_again_at_the_end() {
        let outcome = run("setTimeout(() => {}, 0)\nlet count = 0\nconst bump = () => ++count\nbump()\ncount");
        assert_eq!(outcome.discarded_timers, 2);
        assert_eq!(&lines(&outcome)[1..], [(4, "2".to_string()), (5, "2".to_string())]);
    }

    #[test]
    fn async_functions_settle_without_an_event_loop() {
        let outcome = run("\
async function double(n: number): Promise<number> { return n * 2 }
async function fails() { throw new Error('no') }
let doubled = 0
let message = ''
async function main() {
  doubled = await double(21)
  try { await fails() } catch (e) { message = e.message }
}
const done = main()
doubled
message
double(1) instanceof Promise
const stalled = (async () => { await new Promise(() => {}); console.log('unreachable') })()");
        assert_eq!(failure(&outcome), "");
        let texts: Vec<_> = outcome.results.iter().map(LineResult::text).collect();
        assert_eq!(texts, vec!["42", "'no'", "true"]);
        assert!(outcome.logs.is_empty());
        assert_eq!(outcome.discarded_timers, 1);
    }

    #[test]
    fn accessors_run_on_read_and_write() {
        let outcome = run("\
class Temperature {
  celsius = 0
  get fahrenheit() { return this.celsius * 9 / 5 + 32 }
  set fahrenheit(value) { this.celsius = (value - 32) * 5 / 9 }
}
const t = new Temperature()
t.fahrenheit = 212
t.celsius
const box = { v: 1, get double() { return this.v * 2 } }
box.double = 10
box
const described = Object.create({}, { x: { get: () => 7, enumerable: true } })
described.x");
        let texts: Vec<_> = outcome.results.iter().map(LineResult::text).collect();
        assert_eq!(texts, vec!["100", r#"{"v":1,"double":2}"#, "7"]);
    }

    #[test]
    fn crashed_runs_keep_the_streamed_logs() {
        let streamed = vec![LogEntry::new(LogKind::Log, vec![CapturedValue::Number(1.0)])];
        let mut seen = Vec::new();
        let outcome = crashed(streamed.clone(), &mut |entry| seen.push(entry.clone()));
        assert_eq!(outcome.logs.len(), 2);
        assert_eq!(outcome.logs[0], streamed[0]);
        assert_eq!(outcome.logs[1].kind, LogKind::Error);
        assert_eq!(seen, outcome.logs[1..]);
        assert_eq!(failure(&outcome), "Error: Interpreter crashed");
    }

    #[test]
    fn foreign_result_entries_are_dropped() {
        let outcome = run(
            "__RESULTS__.push({ line: 0, value: 1 })\n__RESULTS__.push('junk')\n__RESULTS__.push({ line: 2 })\n__RESULTS__.push({ line: 2, value: 7, error: 'bad' })",
        );
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].error.as_deref(), Some("bad"));
        assert_eq!(outcome.results[0].text(), "bad");
    }

    #[test]
    fn invalid_code_becomes_a_syntax_error() {
        let instrumented = InstrumentedSource {
            code: "1 +".to_string(),
            captures: 0,
            degraded: None,
        };
        let mut streamed = Vec::new();
        let outcome = Sandbox::default().run(&instrumented, &mut |entry| streamed.push(entry.clone()));
        assert!(failure(&outcome).starts_with("SyntaxError: "));
        assert_eq!(streamed.len(), 1);
    }
}
