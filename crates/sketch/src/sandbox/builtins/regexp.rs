//! `RegExp` on top of the `regex` crate.
//!
//! Only the syntax `regex` understands compiles: no backreferences and no
//! lookaround. Indices reported to scripts count Unicode scalar values.

use super::{Builder, string_argument};
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, Object, ObjectKind, ObjectRef, Property, RegExpData, Value};
use std::rc::Rc;

pub fn regexp_of(value: &Value) -> Option<Rc<RegExpData>> {
    match &value.as_object()?.borrow().kind {
        ObjectKind::RegExp(data) => Some(data.clone()),
        _ => None,
    }
}

pub fn char_index(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

pub fn byte_offset(text: &str, index: usize) -> usize {
    text.char_indices().nth(index).map_or(text.len(), |(offset, _)| offset)
}

/// Translates flags to `regex` inline flags, keeping `g` as state of the object.
pub fn compile(source: &str, flags: &str) -> Result<regex::Regex, String> {
    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' | 'm' | 's' => inline.push(flag),
            'g' | 'u' | 'y' => {}
            _ => return Err(format!("Invalid flags supplied to RegExp constructor '{flags}'")),
        }
    }
    let mut unique: Vec<char> = flags.chars().collect();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() != flags.chars().count() {
        return Err(format!("Invalid flags supplied to RegExp constructor '{flags}'"));
    }
    let pattern = if inline.is_empty() {
        source.to_string()
    } else {
        format!("(?{inline}){source}")
    };
    regex::Regex::new(&pattern).map_err(|error| {
        let reason = error.to_string();
        let reason = reason.lines().last().unwrap_or_default().trim().to_string();
        format!("Invalid regular expression: /{source}/{flags}: {reason}")
    })
}

/// Builds a `RegExp` object, reporting a bad pattern as a `SyntaxError`.
pub fn create(interpreter: &mut Interpreter<'_>, source: &str, flags: &str) -> Result<ObjectRef, Interrupt> {
    let object = interpreter.allocate(Object::new(
        Some(interpreter.realm.regexp_prototype.clone()),
        ObjectKind::Ordinary,
    ));
    initialize(interpreter, &object, source, flags)?;
    Ok(object)
}

fn initialize(interpreter: &mut Interpreter<'_>, object: &ObjectRef, source: &str, flags: &str) -> Result<(), Interrupt> {
    let regex = compile(source, flags).map_err(|message| interpreter.throw(ErrorKind::Syntax, message))?;
    let mut sorted: Vec<char> = flags.chars().collect();
    sorted.sort_unstable();
    let flags: String = sorted.into_iter().collect();
    let data = RegExpData {
        source: if source.is_empty() { "(?:)".to_string() } else { source.to_string() },
        flags,
        regex,
    };
    let mut object = object.borrow_mut();
    object.define("source", Property::hidden(Value::from(data.source.as_str())));
    object.define("flags", Property::hidden(Value::from(data.flags.as_str())));
    object.define("global", Property::hidden(Value::Boolean(data.global())));
    object.define("lastIndex", Property::hidden(Value::Number(0.0)));
    object.kind = ObjectKind::RegExp(Rc::new(data));
    Ok(())
}

/// The array `exec` and non-global `match` return.
pub fn match_result(interpreter: &mut Interpreter<'_>, captures: &regex::Captures<'_>, input: &str) -> Value {
    let groups = captures
        .iter()
        .map(|group| group.map(|group| Value::from(group.as_str())).unwrap_or_default())
        .collect();
    let result = interpreter.array(groups);
    let start = captures.get(0).map_or(0, |whole| whole.start());
    if let Value::Object(object) = &result {
        let mut object = object.borrow_mut();
        object.define("index", Property::enumerable(Value::from(char_index(input, start))));
        object.define("input", Property::enumerable(Value::from(input)));
    }
    result
}

fn construct(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let pattern = call.argument(0);
    let (source, inherited) = match regexp_of(&pattern) {
        Some(data) => (data.source.clone(), data.flags.clone()),
        None if matches!(pattern, Value::Undefined) => (String::new(), String::new()),
        None => (interpreter.to_string(&pattern)?.to_string(), String::new()),
    };
    let flags = match call.argument(1) {
        Value::Undefined => inherited,
        flags => interpreter.to_string(&flags)?.to_string(),
    };
    match &call.this {
        Value::Object(this) => {
            initialize(interpreter, this, &source, &flags)?;
            Ok(call.this)
        }
        _ => Ok(Value::Object(create(interpreter, &source, &flags)?)),
    }
}

fn call_regexp(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let pattern = call.argument(0);
    if regexp_of(&pattern).is_some() && matches!(call.argument(1), Value::Undefined) {
        return Ok(pattern);
    }
    construct(
        interpreter,
        NativeCall {
            this: Value::Undefined,
            arguments: call.arguments,
            callee: call.callee,
        },
    )
}

fn this_regexp(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str) -> Result<Rc<RegExpData>, Interrupt> {
    regexp_of(&call.this).ok_or_else(|| {
        interpreter.throw(
            ErrorKind::Type,
            format!("RegExp.prototype.{method} called on a value that is not a RegExp"),
        )
    })
}

/// One `exec` step, honoring and updating `lastIndex` for global patterns.
pub fn exec_at(interpreter: &mut Interpreter<'_>, this: &Value, data: &RegExpData, input: &str) -> Result<Value, Interrupt> {
    let start = if data.global() {
        let last = interpreter.get_named(this, "lastIndex")?;
        let last = interpreter.to_integer(&last)?;
        if last > input.chars().count() as f64 {
            interpreter.set_named(this, "lastIndex", Value::Number(0.0))?;
            return Ok(Value::Null);
        }
        byte_offset(input, last.max(0.0) as usize)
    } else {
        0
    };
    let Some(captures) = data.regex.captures_at(input, start) else {
        if data.global() {
            interpreter.set_named(this, "lastIndex", Value::Number(0.0))?;
        }
        return Ok(Value::Null);
    };
    if data.global() {
        let end = captures.get(0).map_or(start, |whole| whole.end());
        let mut next = char_index(input, end);
        if end == start && captures.get(0).is_some_and(|whole| whole.is_empty()) {
            next += 1;
        }
        interpreter.set_named(this, "lastIndex", Value::from(next))?;
    }
    Ok(match_result(interpreter, &captures, input))
}

fn exec(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let data = this_regexp(interpreter, &call, "exec")?;
    let input = string_argument(interpreter, &call, 0)?;
    exec_at(interpreter, &call.this, &data, &input)
}

fn test(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let data = this_regexp(interpreter, &call, "test")?;
    let input = string_argument(interpreter, &call, 0)?;
    let result = exec_at(interpreter, &call.this, &data, &input)?;
    Ok(Value::Boolean(!matches!(result, Value::Null)))
}

fn to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let data = this_regexp(interpreter, &call, "toString")?;
    Ok(Value::from(format!("/{}/{}", data.source, data.flags)))
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().regexp_prototype.clone();
    builder.method(&prototype, "exec", exec);
    builder.method(&prototype, "test", test);
    builder.method(&prototype, "toString", to_string);
    let regexp = builder.constructor("RegExp", &prototype, call_regexp, Some(construct));
    builder.global("RegExp", regexp);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_inline_flags() {
        let regex = compile("ab+c", "gi").unwrap();
        assert!(regex.is_match("xABBC"));
        assert!(compile("a", "x").is_err());
        assert!(compile("a", "gg").is_err());
    }

    #[test]
    fn unsupported_syntax_is_reported() {
        let error = compile("(?=a)", "").unwrap_err();
        assert!(error.starts_with("Invalid regular expression: /(?=a)/: "), "{error}");
    }

    #[test]
    fn indices_count_scalar_values() {
        let text = "héllo";
        assert_eq!(char_index(text, 3), 2);
        assert_eq!(byte_offset(text, 2), 3);
        assert_eq!(byte_offset(text, 10), text.len());
    }
}
