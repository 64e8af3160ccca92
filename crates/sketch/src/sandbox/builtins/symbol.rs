use super::Builder;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, Symbol, Value};
use std::rc::Rc;

fn call_symbol(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let description = match call.argument(0) {
        Value::Undefined => None,
        description => Some(interpreter.to_string(&description)?),
    };
    Ok(Value::Symbol(Rc::new(Symbol { description })))
}

fn this_symbol(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>) -> Result<Rc<Symbol>, Interrupt> {
    match &call.this {
        Value::Symbol(symbol) => Ok(symbol.clone()),
        _ => Err(interpreter.throw(
            ErrorKind::Type,
            "Symbol.prototype.toString requires that 'this' be a Symbol",
        )),
    }
}

fn to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::from(this_symbol(interpreter, &call)?.to_string()))
}

fn value_of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Symbol(this_symbol(interpreter, &call)?))
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().symbol_prototype.clone();
    builder.method(&prototype, "toString", to_string);
    builder.method(&prototype, "valueOf", value_of);
    let symbol = builder.constructor("Symbol", &prototype, call_symbol, None);
    builder.global("Symbol", symbol);
}
