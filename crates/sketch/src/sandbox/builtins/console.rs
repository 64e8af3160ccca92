use super::Builder;
use crate::output::{LogEntry, LogKind};
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::value::{NativeCall, Value};

fn emit(interpreter: &mut Interpreter<'_>, kind: LogKind, call: &NativeCall<'_>) -> Result<Value, Interrupt> {
    // Snapshot now; later mutation of the arguments must not change the entry.
    let values = call
        .arguments
        .iter()
        .map(|value| interpreter.capture(value))
        .collect();
    interpreter.emit(LogEntry::new(kind, values));
    Ok(Value::Undefined)
}

fn log(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    emit(interpreter, LogKind::Log, &call)
}

fn error(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    emit(interpreter, LogKind::Error, &call)
}

fn warn(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    emit(interpreter, LogKind::Warn, &call)
}

fn info(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    emit(interpreter, LogKind::Info, &call)
}

pub fn install(builder: &mut Builder<'_>) {
    let console = builder.namespace();
    builder.method(&console, "log", log);
    builder.method(&console, "error", error);
    builder.method(&console, "warn", warn);
    builder.method(&console, "info", info);
    builder.global("console", console);
}
