//! `Promise` without a job queue.
//!
//! Executors run synchronously and settle the promise immediately, but
//! reactions are only counted: a run ends before any of them would fire.

use super::Builder;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, Object, ObjectKind, ObjectRef, PromiseState, Value};

fn promise_of(value: &Value) -> Option<&ObjectRef> {
    value
        .as_object()
        .filter(|object| matches!(object.borrow().kind, ObjectKind::Promise(_)))
}

fn allocate(interpreter: &mut Interpreter<'_>, state: PromiseState) -> Value {
    let promise = Object::new(Some(interpreter.realm.promise_prototype.clone()), ObjectKind::Promise(state));
    Value::Object(interpreter.allocate(promise))
}

/// Settles a pending promise; later settlements are ignored.
fn settle(promise: &ObjectRef, state: PromiseState) {
    let mut promise = promise.borrow_mut();
    if matches!(promise.kind, ObjectKind::Promise(PromiseState::Pending)) {
        promise.kind = ObjectKind::Promise(state);
    }
}

/// Resolving with another promise adopts its state once it is known.
fn resolve_with(promise: &ObjectRef, value: Value) {
    let adopted = match promise_of(&value) {
        Some(other) if std::rc::Rc::ptr_eq(other, promise) => return,
        Some(other) => match &other.borrow().kind {
            ObjectKind::Promise(PromiseState::Fulfilled(value)) => Some(PromiseState::Fulfilled(value.clone())),
            ObjectKind::Promise(PromiseState::Rejected(reason)) => Some(PromiseState::Rejected(reason.clone())),
            _ => None,
        },
        None => Some(PromiseState::Fulfilled(value)),
    };
    if let Some(state) = adopted {
        settle(promise, state);
    }
}

/// What `await` finds in a value.
pub enum Awaited {
    Value(Value),
    Thrown(Value),
    Pending,
}

pub fn awaited(value: Value) -> Awaited {
    let Some(promise) = promise_of(&value) else {
        return Awaited::Value(value);
    };
    match &promise.borrow().kind {
        ObjectKind::Promise(PromiseState::Fulfilled(value)) => Awaited::Value(value.clone()),
        ObjectKind::Promise(PromiseState::Rejected(reason)) => Awaited::Thrown(reason.clone()),
        _ => Awaited::Pending,
    }
}

/// The promise an `async` function call evaluates to.
pub fn settled(interpreter: &mut Interpreter<'_>, outcome: Awaited) -> Value {
    let promise = allocate(interpreter, PromiseState::Pending);
    if let Value::Object(object) = &promise {
        match outcome {
            Awaited::Value(value) => resolve_with(object, value),
            Awaited::Thrown(reason) => settle(object, PromiseState::Rejected(reason)),
            Awaited::Pending => {}
        }
    }
    promise
}

fn resolve_function(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    if let Value::Object(promise) = call.slot(0) {
        resolve_with(&promise, call.argument(0));
    }
    Ok(Value::Undefined)
}

fn reject_function(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    if let Value::Object(promise) = call.slot(0) {
        settle(&promise, PromiseState::Rejected(call.argument(0)));
    }
    Ok(Value::Undefined)
}

fn call_promise(interpreter: &mut Interpreter<'_>, _: NativeCall<'_>) -> Result<Value, Interrupt> {
    Err(interpreter.throw(ErrorKind::Type, "Promise constructor cannot be invoked without 'new'"))
}

fn construct(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let executor = call.argument(0);
    if !executor.is_callable() {
        let found = interpreter.describe(&executor);
        return Err(interpreter.throw(ErrorKind::Type, format!("Promise resolver {found} is not a function")));
    }
    let Value::Object(promise) = &call.this else {
        return Ok(call.this);
    };
    promise.borrow_mut().kind = ObjectKind::Promise(PromiseState::Pending);
    let resolve = interpreter.native("resolve", resolve_function, vec![call.this.clone()]);
    let reject = interpreter.native("reject", reject_function, vec![call.this.clone()]);
    match interpreter.call(&executor, Value::Undefined, &[resolve, reject]) {
        Ok(_) => {}
        Err(Interrupt::Throw(reason)) => settle(promise, PromiseState::Rejected(reason)),
        Err(halt) => return Err(halt),
    }
    Ok(call.this)
}

fn resolve(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let value = call.argument(0);
    if promise_of(&value).is_some() {
        return Ok(value);
    }
    Ok(allocate(interpreter, PromiseState::Fulfilled(value)))
}

fn reject(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(allocate(interpreter, PromiseState::Rejected(call.argument(0))))
}

fn all(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let items = interpreter.iterate(&call.argument(0))?;
    let mut values = Vec::with_capacity(items.len());
    let mut pending = false;
    for item in items {
        let Some(promise) = promise_of(&item) else {
            values.push(item);
            continue;
        };
        let state = match &promise.borrow().kind {
            ObjectKind::Promise(PromiseState::Fulfilled(value)) => Ok(Some(value.clone())),
            ObjectKind::Promise(PromiseState::Rejected(reason)) => Err(reason.clone()),
            _ => Ok(None),
        };
        match state {
            Ok(Some(value)) => values.push(value),
            Ok(None) => pending = true,
            Err(reason) => return Ok(allocate(interpreter, PromiseState::Rejected(reason))),
        }
    }
    if pending {
        return Ok(allocate(interpreter, PromiseState::Pending));
    }
    let values = interpreter.array(values);
    Ok(allocate(interpreter, PromiseState::Fulfilled(values)))
}

/// Records a reaction that would run on a later tick and returns its derived promise.
fn react(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str) -> Result<Value, Interrupt> {
    if promise_of(&call.this).is_none() {
        let found = interpreter.describe(&call.this);
        return Err(interpreter.throw(
            ErrorKind::Type,
            format!("Method Promise.prototype.{method} called on incompatible receiver {found}"),
        ));
    }
    if call.arguments.iter().any(Value::is_callable) {
        interpreter.pending_reactions += 1;
        log::trace!("Promise reaction `{method}` recorded; it never runs");
    }
    Ok(allocate(interpreter, PromiseState::Pending))
}

fn then(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    react(interpreter, &call, "then")
}

fn catch(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    react(interpreter, &call, "catch")
}

fn finally(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    react(interpreter, &call, "finally")
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().promise_prototype.clone();
    builder.method(&prototype, "then", then);
    builder.method(&prototype, "catch", catch);
    builder.method(&prototype, "finally", finally);
    let promise = builder.constructor("Promise", &prototype, call_promise, Some(construct));
    builder.method(&promise, "resolve", resolve);
    builder.method(&promise, "reject", reject);
    builder.method(&promise, "all", all);
    builder.global("Promise", promise);
}
