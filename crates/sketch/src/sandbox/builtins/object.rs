use super::Builder;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{Accessor, NativeCall, Object, ObjectKind, Property, Value};

fn require_object_coercible(interpreter: &mut Interpreter<'_>, value: &Value) -> Result<(), Interrupt> {
    if value.is_nullish() {
        return Err(interpreter.throw(ErrorKind::Type, "Cannot convert undefined or null to object"));
    }
    Ok(())
}

fn construct(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    match call.argument(0) {
        Value::Undefined | Value::Null => Ok(Value::Object(interpreter.object())),
        // No wrapper objects: primitives pass through.
        value => Ok(value),
    }
}

fn keys(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let target = call.argument(0);
    require_object_coercible(interpreter, &target)?;
    let keys = interpreter
        .enumerable_keys(&target)
        .into_iter()
        .map(|key| Value::from(key.to_string()))
        .collect();
    Ok(interpreter.array(keys))
}

fn values(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let target = call.argument(0);
    require_object_coercible(interpreter, &target)?;
    let mut values = Vec::new();
    for key in interpreter.enumerable_keys(&target) {
        values.push(interpreter.get(&target, &key)?);
    }
    Ok(interpreter.array(values))
}

fn entries(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let target = call.argument(0);
    require_object_coercible(interpreter, &target)?;
    let mut entries = Vec::new();
    for key in interpreter.enumerable_keys(&target) {
        let value = interpreter.get(&target, &key)?;
        let entry = interpreter.array(vec![Value::from(key.to_string()), value]);
        entries.push(entry);
    }
    Ok(interpreter.array(entries))
}

fn assign(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let target = call.argument(0);
    require_object_coercible(interpreter, &target)?;
    for source in call.arguments.iter().skip(1) {
        for key in interpreter.enumerable_keys(source) {
            let value = interpreter.get(source, &key)?;
            interpreter.set(&target, key, value)?;
        }
    }
    Ok(target)
}

fn from_entries(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let entries = interpreter.iterate(&call.argument(0))?;
    let object = interpreter.object();
    for entry in entries {
        let key = interpreter.get_named(&entry, "0")?;
        let key = interpreter.to_property_key(&key)?;
        let value = interpreter.get_named(&entry, "1")?;
        object.borrow_mut().define(key, Property::enumerable(value));
    }
    Ok(Value::Object(object))
}

fn freeze(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let target = call.argument(0);
    if let Value::Object(object) = &target {
        object.borrow_mut().frozen = true;
    }
    Ok(target)
}

fn is_frozen(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(match call.argument(0) {
        Value::Object(object) => object.borrow().frozen,
        _ => true,
    }))
}

fn create(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let prototype = match call.argument(0) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        other => {
            let found = interpreter.describe(&other);
            return Err(interpreter.throw(
                ErrorKind::Type,
                format!("Object prototype may only be an Object or null: {found}"),
            ));
        }
    };
    let object = interpreter.allocate(Object::new(prototype, ObjectKind::Ordinary));
    let properties = call.argument(1);
    if let Value::Object(_) = &properties {
        for key in interpreter.enumerable_keys(&properties) {
            let descriptor = interpreter.get(&properties, &key)?;
            let enumerable = interpreter.get_named(&descriptor, "enumerable")?.is_truthy();
            let get = interpreter.get_named(&descriptor, "get")?;
            let set = interpreter.get_named(&descriptor, "set")?;
            let property = if get.is_callable() || set.is_callable() {
                let accessor = Accessor {
                    get: get.is_callable().then_some(get),
                    set: set.is_callable().then_some(set),
                };
                Property::accessor(accessor, enumerable)
            } else {
                Property::new(interpreter.get_named(&descriptor, "value")?, enumerable)
            };
            object.borrow_mut().define(key, property);
        }
    }
    Ok(Value::Object(object))
}

fn get_prototype_of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let target = call.argument(0);
    require_object_coercible(interpreter, &target)?;
    let realm = &interpreter.realm;
    let prototype = match &target {
        Value::Object(object) => object.borrow().prototype.clone(),
        Value::String(_) => Some(realm.string_prototype.clone()),
        Value::Number(_) => Some(realm.number_prototype.clone()),
        Value::Boolean(_) => Some(realm.boolean_prototype.clone()),
        Value::Symbol(_) => Some(realm.symbol_prototype.clone()),
        Value::Undefined | Value::Null => None,
    };
    Ok(prototype.map(Value::Object).unwrap_or(Value::Null))
}

fn is(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let (left, right) = (call.argument(0), call.argument(1));
    let same = match (&left, &right) {
        (Value::Number(left), Value::Number(right)) => {
            (left.is_nan() && right.is_nan()) || (left == right && left.is_sign_negative() == right.is_sign_negative())
        }
        _ => left.strict_equals(&right),
    };
    Ok(Value::Boolean(same))
}

fn has_own_property(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let key = interpreter.to_property_key(&call.argument(0))?;
    Ok(Value::Boolean(match &call.this {
        Value::Object(object) => object.borrow().has_own(&key),
        Value::String(text) => {
            key.as_str() == Some("length") || key.array_index().is_some_and(|index| index < text.chars().count())
        }
        _ => false,
    }))
}

fn to_string(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let tag = match &call.this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Boolean(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Symbol(_) => "Symbol",
        Value::Object(object) => object.borrow().kind.class_name(),
    };
    Ok(Value::from(format!("[object {tag}]")))
}

fn value_of(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(call.this)
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().object_prototype.clone();
    builder.method(&prototype, "hasOwnProperty", has_own_property);
    builder.method(&prototype, "toString", to_string);
    builder.method(&prototype, "valueOf", value_of);

    let object = builder.constructor("Object", &prototype, construct, Some(construct));
    builder.method(&object, "keys", keys);
    builder.method(&object, "values", values);
    builder.method(&object, "entries", entries);
    builder.method(&object, "assign", assign);
    builder.method(&object, "fromEntries", from_entries);
    builder.method(&object, "freeze", freeze);
    builder.method(&object, "isFrozen", is_frozen);
    builder.method(&object, "create", create);
    builder.method(&object, "getPrototypeOf", get_prototype_of);
    builder.method(&object, "is", is);
    builder.global("Object", object);
}
