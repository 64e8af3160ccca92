use super::Builder;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, ObjectKind, Property, Value};

/// `Error(message)` without `new` still constructs.
fn call_error(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    interpreter.construct(&Value::Object(call.callee.clone()), call.arguments)
}

fn construct_error(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let Value::Object(this) = &call.this else {
        return Ok(call.this);
    };
    let message = match call.argument(0) {
        Value::Undefined => None,
        message => Some(interpreter.to_string(&message)?),
    };
    let cause = match call.argument(1) {
        options @ Value::Object(_) => Some(interpreter.get_named(&options, "cause")?),
        _ => None,
    };
    let mut error = this.borrow_mut();
    error.kind = ObjectKind::Error;
    if let Some(message) = message {
        error.define("message", Property::hidden(Value::String(message)));
    }
    if let Some(cause) = cause.filter(|cause| !matches!(cause, Value::Undefined)) {
        error.define("cause", Property::hidden(cause));
    }
    drop(error);
    Ok(call.this)
}

fn to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    if !matches!(call.this, Value::Object(_)) {
        return Err(interpreter.throw(
            ErrorKind::Type,
            "Error.prototype.toString called on a value that is not an object",
        ));
    }
    let name = match interpreter.get_named(&call.this, "name")? {
        Value::Undefined => "Error".into(),
        name => interpreter.to_string(&name)?,
    };
    let message = match interpreter.get_named(&call.this, "message")? {
        Value::Undefined => "".into(),
        message => interpreter.to_string(&message)?,
    };
    Ok(Value::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name.to_string(),
        (true, false) => message.to_string(),
        (false, false) => format!("{name}: {message}"),
    }))
}

pub fn install(builder: &mut Builder<'_>) {
    let base_prototype = builder.realm().error_prototype(ErrorKind::Error).clone();
    builder.method(&base_prototype, "toString", to_string);
    let mut base = None;
    for kind in ErrorKind::ALL {
        let prototype = builder.realm().error_prototype(kind).clone();
        builder.constant(&prototype, "name", kind.name());
        builder.constant(&prototype, "message", "");
        let constructor = builder.constructor(kind.name(), &prototype, call_error, Some(construct_error));
        match &base {
            None => base = Some(constructor.clone()),
            Some(base) => constructor.borrow_mut().prototype = Some(base.clone()),
        }
        builder.global(kind.name(), constructor);
    }
}
