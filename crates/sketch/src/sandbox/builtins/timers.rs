use super::Builder;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::value::{NativeCall, Value};

fn register(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, repeat: bool) -> Result<Value, Interrupt> {
    let delay = match call.arguments.get(1) {
        Some(delay) => interpreter.to_number(delay)?,
        None => 0.0,
    };
    let arguments = call.arguments.get(2..).map(<[Value]>::to_vec).unwrap_or_default();
    let id = interpreter
        .timers
        .register(call.argument(0), delay, arguments, repeat);
    log::trace!("Timer {id} registered ({delay} ms); it is dropped with the run");
    Ok(Value::Number(f64::from(id)))
}

fn set_timeout(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    register(interpreter, &call, false)
}

fn set_interval(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    register(interpreter, &call, true)
}

fn clear(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    if let Value::Number(id) = call.argument(0)
        && id.fract() == 0.0
        && id >= 0.0
    {
        interpreter.timers.clear(id as u32);
    }
    Ok(Value::Undefined)
}

pub fn install(builder: &mut Builder<'_>) {
    let set_timeout = builder.function("setTimeout", set_timeout);
    builder.global("setTimeout", set_timeout);
    let set_interval = builder.function("setInterval", set_interval);
    builder.global("setInterval", set_interval);
    let clear_timeout = builder.function("clearTimeout", clear);
    builder.global("clearTimeout", clear_timeout);
    let clear_interval = builder.function("clearInterval", clear);
    builder.global("clearInterval", clear_interval);
}
