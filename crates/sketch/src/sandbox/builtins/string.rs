use super::regexp::{self, byte_offset, char_index, regexp_of};
use super::{Builder, integer_argument, relative_index, string_argument};
use crate::parser::number_to_string;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, NativeFn, RegExpData, Value};
use std::rc::Rc;

/// Longest string `repeat` and the padding methods will build, in bytes.
const MAX_STRING_LENGTH: usize = 1 << 28;

fn convert(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    match call.arguments.first() {
        None => Ok(Value::from("")),
        Some(Value::Symbol(symbol)) => Ok(Value::from(symbol.to_string())),
        Some(value) => Ok(Value::String(interpreter.to_string(value)?)),
    }
}

fn from_char_code(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let mut units = Vec::with_capacity(call.arguments.len());
    for argument in call.arguments {
        units.push((interpreter.to_uint32(argument)? & 0xffff) as u16);
    }
    Ok(Value::from(String::from_utf16_lossy(&units)))
}

/// `String.raw`: the raw text of a template with its substitutions.
fn raw(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let strings = call.argument(0);
    let raw = interpreter.get_named(&strings, "raw")?;
    let parts = interpreter.iterate(&raw)?;
    let mut text = String::new();
    for (index, part) in parts.iter().enumerate() {
        text.push_str(&interpreter.to_string(part)?);
        if index + 1 < parts.len()
            && let Some(substitution) = call.arguments.get(index + 1)
        {
            text.push_str(&interpreter.to_string(substitution)?);
        }
    }
    Ok(Value::from(text))
}

fn this_string(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str) -> Result<Rc<str>, Interrupt> {
    if call.this.is_nullish() {
        return Err(interpreter.throw(
            ErrorKind::Type,
            format!("String.prototype.{method} called on null or undefined"),
        ));
    }
    interpreter.to_string(&call.this)
}

fn char_at(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "charAt")?;
    let index = integer_argument(interpreter, &call, 0, 0.0)?;
    let found = (index >= 0.0)
        .then(|| text.chars().nth(index as usize))
        .flatten()
        .map(String::from)
        .unwrap_or_default();
    Ok(Value::from(found))
}

fn char_code_at(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "charCodeAt")?;
    let index = integer_argument(interpreter, &call, 0, 0.0)?;
    let found = (index >= 0.0).then(|| text.chars().nth(index as usize)).flatten();
    Ok(Value::Number(found.map_or(f64::NAN, |character| f64::from(u32::from(character)))))
}

fn at(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "at")?;
    let length = text.chars().count() as f64;
    let position = integer_argument(interpreter, &call, 0, 0.0)?;
    let index = if position < 0.0 { length + position } else { position };
    if index < 0.0 || index >= length {
        return Ok(Value::Undefined);
    }
    Ok(text
        .chars()
        .nth(index as usize)
        .map(|character| Value::from(character.to_string()))
        .unwrap_or_default())
}

fn index_of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "indexOf")?;
    let needle = string_argument(interpreter, &call, 0)?;
    let start = relative_index(integer_argument(interpreter, &call, 1, 0.0)?.max(0.0), text.chars().count());
    let offset = byte_offset(&text, start);
    let found = text[offset..]
        .find(needle.as_str())
        .map_or(-1.0, |byte| char_index(&text, offset + byte) as f64);
    Ok(Value::Number(found))
}

fn last_index_of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "lastIndexOf")?;
    let needle = string_argument(interpreter, &call, 0)?;
    let length = text.chars().count();
    let limit = match call.argument(1) {
        Value::Undefined => length,
        position => {
            let position = interpreter.to_number(&position)?;
            if position.is_nan() { length } else { position.clamp(0.0, length as f64) as usize }
        }
    };
    let end = byte_offset(&text, limit).saturating_add(needle.len()).min(text.len());
    let end = (end..=text.len()).find(|end| text.is_char_boundary(*end)).unwrap_or(text.len());
    let found = text[..end]
        .rfind(needle.as_str())
        .map_or(-1.0, |byte| char_index(&text, byte) as f64);
    Ok(Value::Number(found))
}

fn includes(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "includes")?;
    if regexp_of(&call.argument(0)).is_some() {
        return Err(interpreter.throw(
            ErrorKind::Type,
            "First argument to String.prototype.includes must not be a regular expression",
        ));
    }
    let needle = string_argument(interpreter, &call, 0)?;
    let start = relative_index(integer_argument(interpreter, &call, 1, 0.0)?.max(0.0), text.chars().count());
    Ok(Value::Boolean(text[byte_offset(&text, start)..].contains(needle.as_str())))
}

fn starts_with(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "startsWith")?;
    let needle = string_argument(interpreter, &call, 0)?;
    let start = relative_index(integer_argument(interpreter, &call, 1, 0.0)?.max(0.0), text.chars().count());
    Ok(Value::Boolean(text[byte_offset(&text, start)..].starts_with(needle.as_str())))
}

fn ends_with(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "endsWith")?;
    let needle = string_argument(interpreter, &call, 0)?;
    let length = text.chars().count();
    let end = relative_index(integer_argument(interpreter, &call, 1, length as f64)?.max(0.0), length);
    Ok(Value::Boolean(text[..byte_offset(&text, end)].ends_with(needle.as_str())))
}

fn chars_between(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

fn slice(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "slice")?;
    let length = text.chars().count();
    let start = relative_index(integer_argument(interpreter, &call, 0, 0.0)?, length);
    let end = relative_index(integer_argument(interpreter, &call, 1, length as f64)?, length);
    Ok(Value::from(chars_between(&text, start, end)))
}

fn substring(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "substring")?;
    let length = text.chars().count();
    let clamp = |position: f64| position.clamp(0.0, length as f64) as usize;
    let start = clamp(integer_argument(interpreter, &call, 0, 0.0)?);
    let end = clamp(integer_argument(interpreter, &call, 1, length as f64)?);
    Ok(Value::from(chars_between(&text, start.min(end), start.max(end))))
}

fn to_upper_case(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::from(this_string(interpreter, &call, "toUpperCase")?.to_uppercase()))
}

fn to_lower_case(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::from(this_string(interpreter, &call, "toLowerCase")?.to_lowercase()))
}

fn is_js_whitespace(character: char) -> bool {
    character.is_whitespace() || character == '\u{feff}'
}

fn trim(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::from(this_string(interpreter, &call, "trim")?.trim_matches(is_js_whitespace)))
}

fn trim_start(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::from(this_string(interpreter, &call, "trimStart")?.trim_start_matches(is_js_whitespace)))
}

fn trim_end(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::from(this_string(interpreter, &call, "trimEnd")?.trim_end_matches(is_js_whitespace)))
}

fn invalid_length(interpreter: &mut Interpreter<'_>) -> Interrupt {
    interpreter.throw(ErrorKind::Range, "Invalid string length")
}

fn repeat(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "repeat")?;
    let count = integer_argument(interpreter, &call, 0, 0.0)?;
    if count < 0.0 || count.is_infinite() {
        return Err(interpreter.throw(ErrorKind::Range, format!("Invalid count value: {}", number_to_string(count))));
    }
    if text.len() as f64 * count > MAX_STRING_LENGTH as f64 {
        return Err(invalid_length(interpreter));
    }
    Ok(Value::from(text.repeat(count as usize)))
}

fn padding(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str) -> Result<(Rc<str>, String), Interrupt> {
    let text = this_string(interpreter, call, method)?;
    let target = integer_argument(interpreter, call, 0, 0.0)?;
    let filler = match call.argument(1) {
        Value::Undefined => " ".to_string(),
        filler => interpreter.to_string(&filler)?.to_string(),
    };
    let length = text.chars().count();
    if target <= length as f64 || filler.is_empty() {
        return Ok((text, String::new()));
    }
    if target > MAX_STRING_LENGTH as f64 {
        return Err(invalid_length(interpreter));
    }
    let missing = target as usize - length;
    let pad = filler.chars().cycle().take(missing).collect();
    Ok((text, pad))
}

fn pad_start(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let (text, pad) = padding(interpreter, &call, "padStart")?;
    Ok(Value::from(format!("{pad}{text}")))
}

fn pad_end(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let (text, pad) = padding(interpreter, &call, "padEnd")?;
    Ok(Value::from(format!("{text}{pad}")))
}

fn concat(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let mut text = this_string(interpreter, &call, "concat")?.to_string();
    for argument in call.arguments {
        text.push_str(&interpreter.to_string(argument)?);
    }
    Ok(Value::from(text))
}

fn to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    match &call.this {
        Value::String(_) => Ok(call.this),
        _ => Err(interpreter.throw(ErrorKind::Type, "String.prototype.toString requires that 'this' be a String")),
    }
}

// Pattern matching shared by `split`, `replace`, `replaceAll` and `match`.

struct Found {
    start: usize,
    end: usize,
    groups: Vec<Option<String>>,
    named: Vec<(String, Option<String>)>,
}

enum Pattern {
    Text(String),
    RegExp(Rc<RegExpData>),
}

fn pattern_argument(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>) -> Result<Pattern, Interrupt> {
    match regexp_of(&call.argument(0)) {
        Some(data) => Ok(Pattern::RegExp(data)),
        None => Ok(Pattern::Text(string_argument(interpreter, call, 0)?)),
    }
}

fn find_matches(pattern: &Pattern, text: &str, all: bool) -> Vec<Found> {
    let limit = if all { usize::MAX } else { 1 };
    match pattern {
        Pattern::Text(needle) => text
            .match_indices(needle.as_str())
            .take(limit)
            .map(|(start, matched)| Found {
                start,
                end: start + matched.len(),
                groups: Vec::new(),
                named: Vec::new(),
            })
            .collect(),
        Pattern::RegExp(data) => data
            .regex
            .captures_iter(text)
            .take(limit)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let groups = captures
                    .iter()
                    .skip(1)
                    .map(|group| group.map(|group| group.as_str().to_string()))
                    .collect();
                let named = data
                    .regex
                    .capture_names()
                    .flatten()
                    .map(|name| (name.to_string(), captures.name(name).map(|group| group.as_str().to_string())))
                    .collect();
                Some(Found {
                    start: whole.start(),
                    end: whole.end(),
                    groups,
                    named,
                })
            })
            .collect(),
    }
}

/// Expands `$$`, `$&`, `` $` ``, `$'`, `$n` and `$<name>` in a replacement.
fn expand(template: &str, found: &Found, text: &str) -> String {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(dollar) = rest.find('$') {
        expanded.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        let mut consumed = 1;
        match after.chars().next() {
            Some('$') => expanded.push('$'),
            Some('&') => expanded.push_str(&text[found.start..found.end]),
            Some('`') => expanded.push_str(&text[..found.start]),
            Some('\'') => expanded.push_str(&text[found.end..]),
            Some('<') if !found.named.is_empty() => match after.find('>') {
                Some(close) => {
                    let name = &after[1..close];
                    if let Some((_, Some(group))) = found.named.iter().find(|(candidate, _)| candidate == name) {
                        expanded.push_str(group);
                    }
                    consumed = close + 1;
                }
                None => {
                    expanded.push('$');
                    consumed = 0;
                }
            },
            Some(digit) if digit.is_ascii_digit() => {
                let two = after
                    .get(..2)
                    .filter(|digits| digits.bytes().all(|byte| byte.is_ascii_digit()))
                    .and_then(|digits| digits.parse::<usize>().ok())
                    .filter(|index| (1..=found.groups.len()).contains(index));
                let one = digit
                    .to_digit(10)
                    .map(|index| index as usize)
                    .filter(|index| (1..=found.groups.len()).contains(index));
                match (two, one) {
                    (Some(index), _) => {
                        expanded.push_str(found.groups[index - 1].as_deref().unwrap_or_default());
                        consumed = 2;
                    }
                    (None, Some(index)) => {
                        expanded.push_str(found.groups[index - 1].as_deref().unwrap_or_default());
                    }
                    (None, None) => {
                        expanded.push('$');
                        consumed = 0;
                    }
                }
            }
            _ => {
                expanded.push('$');
                consumed = 0;
            }
        }
        rest = &after[consumed..];
    }
    expanded.push_str(rest);
    expanded
}

fn replace_with(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str, all: bool) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, call, method)?;
    let pattern = pattern_argument(interpreter, call)?;
    let all = match &pattern {
        Pattern::RegExp(data) if all && !data.global() => {
            return Err(interpreter.throw(ErrorKind::Type, "replaceAll must be called with a global RegExp"));
        }
        Pattern::RegExp(data) => data.global(),
        Pattern::Text(_) => all,
    };
    let replacement = call.argument(1);
    let template = if replacement.is_callable() {
        None
    } else {
        Some(interpreter.to_string(&replacement)?)
    };
    let mut replaced = String::with_capacity(text.len());
    let mut last = 0;
    for found in find_matches(&pattern, &text, all) {
        replaced.push_str(&text[last..found.start]);
        match &template {
            Some(template) => replaced.push_str(&expand(template, &found, &text)),
            None => {
                let mut arguments = vec![Value::from(&text[found.start..found.end])];
                arguments.extend(
                    found
                        .groups
                        .iter()
                        .map(|group| group.as_deref().map(Value::from).unwrap_or_default()),
                );
                arguments.push(Value::from(char_index(&text, found.start)));
                arguments.push(Value::String(text.clone()));
                let result = interpreter.call(&replacement, Value::Undefined, &arguments)?;
                replaced.push_str(&interpreter.to_string(&result)?);
            }
        }
        last = found.end;
    }
    replaced.push_str(&text[last..]);
    Ok(Value::from(replaced))
}

fn replace(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    replace_with(interpreter, &call, "replace", false)
}

fn replace_all(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    replace_with(interpreter, &call, "replaceAll", true)
}

fn split(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "split")?;
    let limit = match call.argument(1) {
        Value::Undefined => usize::MAX,
        limit => interpreter.to_uint32(&limit)? as usize,
    };
    let parts: Vec<String> = match call.argument(0) {
        Value::Undefined => vec![text.to_string()],
        separator => {
            let pattern = match regexp_of(&separator) {
                Some(data) => Pattern::RegExp(data),
                None => Pattern::Text(interpreter.to_string(&separator)?.to_string()),
            };
            match &pattern {
                Pattern::Text(needle) if needle.is_empty() => text.chars().map(String::from).collect(),
                _ if text.is_empty() => {
                    let matches_empty = !find_matches(&pattern, "", false).is_empty();
                    if matches_empty { Vec::new() } else { vec![String::new()] }
                }
                _ => {
                    let mut parts = Vec::new();
                    let mut last = 0;
                    for found in find_matches(&pattern, &text, true) {
                        // An empty match splits between characters, never at the ends.
                        if found.end == found.start && (found.start == 0 || found.start == text.len()) {
                            continue;
                        }
                        parts.push(text[last..found.start].to_string());
                        last = found.end;
                    }
                    parts.push(text[last..].to_string());
                    parts
                }
            }
        }
    };
    let parts = parts.into_iter().take(limit).map(Value::from).collect();
    Ok(interpreter.array(parts))
}

fn match_method(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "match")?;
    let data = match regexp_of(&call.argument(0)) {
        Some(data) => data,
        None => {
            let source = match call.argument(0) {
                Value::Undefined => String::new(),
                source => interpreter.to_string(&source)?.to_string(),
            };
            let object = regexp::create(interpreter, &source, "")?;
            match regexp_of(&Value::Object(object)) {
                Some(data) => data,
                None => return Ok(Value::Null),
            }
        }
    };
    if !data.global() {
        return Ok(match data.regex.captures(&text) {
            Some(captures) => regexp::match_result(interpreter, &captures, &text),
            None => Value::Null,
        });
    }
    let found: Vec<Value> = data
        .regex
        .find_iter(&text)
        .map(|found| Value::from(found.as_str()))
        .collect();
    if found.is_empty() {
        return Ok(Value::Null);
    }
    Ok(interpreter.array(found))
}

fn locale_compare(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = this_string(interpreter, &call, "localeCompare")?;
    let other = string_argument(interpreter, &call, 0)?;
    Ok(Value::Number(match text.as_ref().cmp(other.as_str()) {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    }))
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().string_prototype.clone();
    let methods: [(&str, NativeFn); 26] = [
        ("charAt", char_at),
        ("charCodeAt", char_code_at),
        ("at", at),
        ("indexOf", index_of),
        ("lastIndexOf", last_index_of),
        ("includes", includes),
        ("startsWith", starts_with),
        ("endsWith", ends_with),
        ("slice", slice),
        ("substring", substring),
        ("toUpperCase", to_upper_case),
        ("toLowerCase", to_lower_case),
        ("trim", trim),
        ("trimStart", trim_start),
        ("trimEnd", trim_end),
        ("split", split),
        ("replace", replace),
        ("replaceAll", replace_all),
        ("repeat", repeat),
        ("padStart", pad_start),
        ("padEnd", pad_end),
        ("concat", concat),
        ("match", match_method),
        ("toString", to_string),
        ("valueOf", to_string),
        ("localeCompare", locale_compare),
    ];
    for (name, call) in methods {
        builder.method(&prototype, name, call);
    }
    let string = builder.constructor("String", &prototype, convert, None);
    builder.method(&string, "fromCharCode", from_char_code);
    builder.method(&string, "raw", raw);
    builder.global("String", string);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(text: &str, needle: &str) -> Found {
        let start = text.find(needle).unwrap();
        Found {
            start,
            end: start + needle.len(),
            groups: vec![Some("a".to_string()), None],
            named: vec![("first".to_string(), Some("a".to_string()))],
        }
    }

    #[test]
    fn replacement_patterns() {
        let text = "xaby";
        let found = found(text, "ab");
        assert_eq!(expand("[$&]", &found, text), "[ab]");
        assert_eq!(expand("$`|$'", &found, text), "x|y");
        assert_eq!(expand("$1-$2-$3", &found, text), "a--$3");
        assert_eq!(expand("$<first>$$", &found, text), "a$");
        assert_eq!(expand("cost: $", &found, text), "cost: $");
    }

    #[test]
    fn text_patterns_find_every_occurrence() {
        let pattern = Pattern::Text("o".to_string());
        let positions: Vec<usize> = find_matches(&pattern, "foo bo", true).iter().map(|found| found.start).collect();
        assert_eq!(positions, [1, 2, 5]);
        assert_eq!(find_matches(&pattern, "foo bo", false).len(), 1);
    }
}
