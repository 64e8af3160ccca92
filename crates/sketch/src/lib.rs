//! Live evaluation for a TypeScript scratchpad.
//!
//! A script goes through [`instrument`](instrument::instrument), runs once in
//! a [`Sandbox`](sandbox::Sandbox), and its logs and captured values are laid
//! onto source lines by [`correlate`](correlate::correlate).
//! [`Playground`](playground::Playground) performs the whole pass and
//! [`RunScheduler`](scheduler::RunScheduler) debounces it.

pub mod config;
pub mod correlate;
pub mod error;
pub mod instrument;
pub mod output;
pub mod parser;
pub mod playground;
pub mod sandbox;
pub mod scheduler;

pub use config::{DisplaySettings, PlaygroundConfig};
pub use correlate::{LineOutput, LineView, RenderOptions, correlate};
pub use error::{ConfigError, RuntimeError, TransformError};
pub use instrument::{InstrumentedSource, instrument};
pub use output::{CapturedValue, ExecutionOutcome, LineResult, LogEntry, LogKind, format_value};
pub use playground::Playground;
pub use sandbox::{Sandbox, SandboxLimits};
pub use scheduler::{RunScheduler, SchedulerState};
