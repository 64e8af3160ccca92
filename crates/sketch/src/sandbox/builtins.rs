//! Native objects and functions installed into every run.

use super::interpreter::{Interpreter, Interrupt};
use super::realm::{ErrorKind, Heap, Realm};
use super::value::{NativeCall, NativeFn, Object, ObjectKind, ObjectRef, Property, Value};
use std::collections::HashMap;

mod array;
mod collections;
mod console;
mod date;
mod error;
mod function;
mod global;
mod json;
mod math;
mod number;
mod object;
mod promise;
mod regexp;
mod string;
mod symbol;
mod timers;

pub use json::stringify;
pub use promise::{Awaited, awaited, settled};
pub use regexp::create as create_regexp;

/// Wires native functions onto the realm's prototypes while a run starts.
pub struct Builder<'a> {
    heap: &'a mut Heap,
    realm: &'a Realm,
    globals: HashMap<&'static str, Value>,
}

impl Builder<'_> {
    pub fn realm(&self) -> &Realm {
        self.realm
    }

    pub fn function(&mut self, name: &str, call: NativeFn) -> ObjectRef {
        self.realm.native_function(self.heap, name, call, None, Vec::new())
    }

    pub fn method(&mut self, target: &ObjectRef, name: &str, call: NativeFn) {
        let function = self.function(name, call);
        target
            .borrow_mut()
            .define(name, Property::hidden(Value::Object(function)));
    }

    pub fn constant(&mut self, target: &ObjectRef, name: &str, value: impl Into<Value>) {
        target.borrow_mut().define(name, Property::hidden(value.into()));
    }

    /// A constructor linked both ways with its prototype object.
    pub fn constructor(
        &mut self,
        name: &str,
        prototype: &ObjectRef,
        call: NativeFn,
        construct: Option<NativeFn>,
    ) -> ObjectRef {
        let constructor = self
            .realm
            .native_function(self.heap, name, call, construct, Vec::new());
        constructor
            .borrow_mut()
            .define("prototype", Property::hidden(Value::Object(prototype.clone())));
        prototype
            .borrow_mut()
            .define("constructor", Property::hidden(Value::Object(constructor.clone())));
        constructor
    }

    pub fn namespace(&mut self) -> ObjectRef {
        self.heap.allocate(Object::new(
            Some(self.realm.object_prototype.clone()),
            ObjectKind::Ordinary,
        ))
    }

    pub fn global(&mut self, name: &'static str, value: impl Into<Value>) {
        self.globals.insert(name, value.into());
    }
}

/// Installs every built-in and returns the global bindings by name.
pub fn install(heap: &mut Heap, realm: &Realm) -> HashMap<&'static str, Value> {
    let mut builder = Builder {
        heap,
        realm,
        globals: HashMap::new(),
    };
    object::install(&mut builder);
    function::install(&mut builder);
    array::install(&mut builder);
    string::install(&mut builder);
    number::install(&mut builder);
    math::install(&mut builder);
    json::install(&mut builder);
    collections::install(&mut builder);
    error::install(&mut builder);
    date::install(&mut builder);
    regexp::install(&mut builder);
    promise::install(&mut builder);
    symbol::install(&mut builder);
    console::install(&mut builder);
    timers::install(&mut builder);
    global::install(&mut builder);
    builder.globals
}

/// The argument at `index`, which must be callable.
pub fn callback(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, index: usize) -> Result<Value, Interrupt> {
    let function = call.argument(index);
    if function.is_callable() {
        Ok(function)
    } else {
        let found = interpreter.describe(&function);
        Err(interpreter.throw(ErrorKind::Type, format!("{found} is not a function")))
    }
}

/// Resolves a possibly negative relative position against `length`.
pub fn relative_index(position: f64, length: usize) -> usize {
    if position < 0.0 {
        (length as f64 + position).max(0.0) as usize
    } else {
        position.min(length as f64) as usize
    }
}

/// Integer argument with a default for `undefined`.
pub fn integer_argument(
    interpreter: &mut Interpreter<'_>,
    call: &NativeCall<'_>,
    index: usize,
    default: f64,
) -> Result<f64, Interrupt> {
    match call.arguments.get(index) {
        None | Some(Value::Undefined) => Ok(default),
        Some(value) => interpreter.to_integer(value),
    }
}

pub fn string_argument(
    interpreter: &mut Interpreter<'_>,
    call: &NativeCall<'_>,
    index: usize,
) -> Result<String, Interrupt> {
    Ok(interpreter.to_string(&call.argument(index))?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_positions() {
        assert_eq!(relative_index(-1.0, 5), 4);
        assert_eq!(relative_index(-10.0, 5), 0);
        assert_eq!(relative_index(2.0, 5), 2);
        assert_eq!(relative_index(f64::INFINITY, 5), 5);
        assert_eq!(relative_index(f64::NEG_INFINITY, 5), 0);
    }
}
