use super::Builder;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{BoundFunction, Function, NativeCall, Object, ObjectKind, ObjectRef, Property, Value};

fn this_function(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str) -> Result<ObjectRef, Interrupt> {
    match &call.this {
        Value::Object(object) if call.this.is_callable() => Ok(object.clone()),
        _ => Err(interpreter.throw(
            ErrorKind::Type,
            format!("Function.prototype.{method} called on a value that is not a function"),
        )),
    }
}

fn call_method(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let function = this_function(interpreter, &call, "call")?;
    let arguments = call.arguments.get(1..).unwrap_or_default();
    interpreter.call(&Value::Object(function), call.argument(0), arguments)
}

fn apply(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let function = this_function(interpreter, &call, "apply")?;
    let arguments = match call.argument(1) {
        Value::Undefined | Value::Null => Vec::new(),
        list => interpreter.iterate(&list)?,
    };
    interpreter.call(&Value::Object(function), call.argument(0), &arguments)
}

fn bind(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let target = this_function(interpreter, &call, "bind")?;
    let name = match interpreter.get_named(&Value::Object(target.clone()), "name")? {
        Value::String(name) => name.to_string(),
        _ => String::new(),
    };
    let mut bound = Object::new(
        Some(interpreter.realm.function_prototype.clone()),
        ObjectKind::Function(Function::Bound(BoundFunction {
            target,
            this: call.argument(0),
            arguments: call.arguments.get(1..).map(<[Value]>::to_vec).unwrap_or_default(),
        })),
    );
    bound.define("name", Property::hidden(Value::from(format!("bound {name}"))));
    Ok(Value::Object(interpreter.allocate(bound)))
}

fn to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let function = this_function(interpreter, &call, "toString")?;
    Ok(Value::from(interpreter.function_source(&function)))
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().function_prototype.clone();
    builder.method(&prototype, "call", call_method);
    builder.method(&prototype, "apply", apply);
    builder.method(&prototype, "bind", bind);
    builder.method(&prototype, "toString", to_string);
    builder.constant(&prototype, "name", "");
}
