//! `JSON.stringify` over interpreter values and `JSON.parse` through `serde_json`.

use super::{Builder, string_argument};
use crate::parser::number_to_string;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, ObjectKind, ObjectRef, Property, PropertyKey, Value};
use std::rc::Rc;

/// Deeper nesting is refused instead of recursing further.
const MAX_NESTING: usize = 4096;

enum Replacer {
    None,
    Function(Value),
    Keys(Vec<PropertyKey>),
}

struct Serializer {
    replacer: Replacer,
    indent: String,
    stack: Vec<ObjectRef>,
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

impl Serializer {
    /// `None` when the value has no JSON form (`undefined`, functions, symbols).
    fn property(
        &mut self,
        interpreter: &mut Interpreter<'_>,
        holder: &Value,
        key: &PropertyKey,
        value: Value,
    ) -> Result<Option<String>, Interrupt> {
        let mut value = value;
        if let Value::Object(_) = &value {
            let to_json = interpreter.get_named(&value, "toJSON")?;
            if to_json.is_callable() {
                value = interpreter.call(&to_json, value.clone(), &[Value::from(key.to_string())])?;
            }
        }
        if let Replacer::Function(replacer) = &self.replacer {
            let replacer = replacer.clone();
            value = interpreter.call(&replacer, holder.clone(), &[Value::from(key.to_string()), value])?;
        }
        Ok(match &value {
            Value::Null => Some("null".to_string()),
            Value::Boolean(boolean) => Some(boolean.to_string()),
            Value::Number(number) if number.is_finite() => Some(number_to_string(*number)),
            Value::Number(_) => Some("null".to_string()),
            Value::String(text) => Some(quote(text)),
            Value::Undefined | Value::Symbol(_) => None,
            Value::Object(object) => {
                if matches!(object.borrow().kind, ObjectKind::Function(_)) {
                    return Ok(None);
                }
                Some(self.object(interpreter, object)?)
            }
        })
    }

    fn object(&mut self, interpreter: &mut Interpreter<'_>, object: &ObjectRef) -> Result<String, Interrupt> {
        if self.stack.iter().any(|open| Rc::ptr_eq(open, object)) {
            return Err(interpreter.throw(ErrorKind::Type, "Converting circular structure to JSON"));
        }
        if self.stack.len() >= MAX_NESTING {
            return Err(interpreter.throw(ErrorKind::Range, "Maximum call stack size exceeded"));
        }
        self.stack.push(object.clone());
        let result = self.members(interpreter, object);
        self.stack.pop();
        result
    }

    fn members(&mut self, interpreter: &mut Interpreter<'_>, object: &ObjectRef) -> Result<String, Interrupt> {
        let holder = Value::Object(object.clone());
        let items = match &object.borrow().kind {
            ObjectKind::Array(items) => Some(items.clone()),
            _ => None,
        };
        let mut parts = Vec::new();
        let is_array = items.is_some();
        match items {
            Some(items) => {
                for (index, item) in items.into_iter().enumerate() {
                    let part = self.property(interpreter, &holder, &PropertyKey::from(index), item)?;
                    parts.push(part.unwrap_or_else(|| "null".to_string()));
                }
            }
            None => {
                let keys: Vec<PropertyKey> = match &self.replacer {
                    Replacer::Keys(keys) => keys
                        .iter()
                        .filter(|key| object.borrow().has_own(key))
                        .cloned()
                        .collect(),
                    _ => object.borrow().enumerable_keys(),
                };
                for key in keys {
                    let value = interpreter.get(&holder, &key)?;
                    if let Some(part) = self.property(interpreter, &holder, &key, value)? {
                        let separator = if self.indent.is_empty() { ":" } else { ": " };
                        parts.push(format!("{}{separator}{part}", quote(&key.to_string())));
                    }
                }
            }
        }
        let (open, close) = if is_array { ('[', ']') } else { ('{', '}') };
        if parts.is_empty() {
            return Ok(format!("{open}{close}"));
        }
        if self.indent.is_empty() {
            return Ok(format!("{open}{}{close}", parts.join(",")));
        }
        let inner = self.indent.repeat(self.stack.len());
        let outer = self.indent.repeat(self.stack.len() - 1);
        let body = parts
            .iter()
            .map(|part| format!("{inner}{part}"))
            .collect::<Vec<_>>()
            .join(",\n");
        Ok(format!("{open}\n{body}\n{outer}{close}"))
    }
}

/// `JSON.stringify(value, replacer, indent)`; `None` for a value with no JSON form.
pub fn stringify(
    interpreter: &mut Interpreter<'_>,
    value: &Value,
    replacer: &Value,
    indent: &Value,
) -> Result<Option<String>, Interrupt> {
    let replacer = match replacer {
        _ if replacer.is_callable() => Replacer::Function(replacer.clone()),
        Value::Object(object) if matches!(object.borrow().kind, ObjectKind::Array(_)) => {
            let mut keys = Vec::new();
            for item in interpreter.iterate(replacer)? {
                if matches!(item, Value::String(_) | Value::Number(_)) {
                    let key = interpreter.to_property_key(&item)?;
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
            Replacer::Keys(keys)
        }
        _ => Replacer::None,
    };
    let indent = match indent {
        Value::Number(count) => " ".repeat(count.clamp(0.0, 10.0) as usize),
        Value::String(text) => text.chars().take(10).collect(),
        _ => String::new(),
    };
    let mut serializer = Serializer {
        replacer,
        indent,
        stack: Vec::new(),
    };
    let holder = Value::Object(interpreter.object());
    if let Value::Object(wrapper) = &holder {
        wrapper
            .borrow_mut()
            .define("", Property::enumerable(value.clone()));
    }
    serializer.property(interpreter, &holder, &PropertyKey::from(""), value.clone())
}

fn stringify_native(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let json = stringify(interpreter, &call.argument(0), &call.argument(1), &call.argument(2))?;
    Ok(json.map(Value::from).unwrap_or_default())
}

fn from_json(interpreter: &mut Interpreter<'_>, json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(boolean) => Value::Boolean(boolean),
        serde_json::Value::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(text) => Value::from(text),
        serde_json::Value::Array(items) => {
            let items = items.into_iter().map(|item| from_json(interpreter, item)).collect();
            interpreter.array(items)
        }
        serde_json::Value::Object(members) => {
            let object = interpreter.object();
            for (key, member) in members {
                let member = from_json(interpreter, member);
                object.borrow_mut().define(key, Property::enumerable(member));
            }
            Value::Object(object)
        }
    }
}

fn parse(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = string_argument(interpreter, &call, 0)?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Ok(from_json(interpreter, json)),
        Err(error) => Err(interpreter.throw(ErrorKind::Syntax, format!("Unexpected token in JSON: {error}"))),
    }
}

pub fn install(builder: &mut Builder<'_>) {
    let json = builder.namespace();
    builder.method(&json, "stringify", stringify_native);
    builder.method(&json, "parse", parse);
    builder.global("JSON", json);
}
