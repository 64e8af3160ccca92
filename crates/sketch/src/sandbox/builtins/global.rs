//! Global functions: number parsing and URI coding.

use super::{Builder, string_argument};
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, Value};

const URI_UNRESERVED: &str = "-_.!~*'()";
const URI_RESERVED: &str = ";/?:@&=+$,#";

pub fn parse_int(text: &str, radix: i32) -> f64 {
    let text = text.trim_start();
    let (negative, mut digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut radix = radix;
    let hex_prefix = digits.starts_with("0x") || digits.starts_with("0X");
    if radix == 0 {
        radix = if hex_prefix { 16 } else { 10 };
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if radix == 16 && hex_prefix {
        digits = &digits[2..];
    }
    let radix = radix as u32;
    let mut total: Option<f64> = None;
    for character in digits.chars() {
        let Some(digit) = character.to_digit(radix) else {
            break;
        };
        total = Some(total.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
    }
    match total {
        Some(total) if negative => -total,
        Some(total) => total,
        None => f64::NAN,
    }
}

pub fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let unsigned = text.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") && text.len() - unsigned.len() <= 1 {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut digits = 0;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
        digits += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits_start = exponent_end;
        while bytes.get(exponent_end).is_some_and(u8::is_ascii_digit) {
            exponent_end += 1;
        }
        if exponent_end > exponent_digits_start {
            end = exponent_end;
        }
    }
    text[..end].trim_end_matches('.').parse().unwrap_or(f64::NAN)
}

pub fn encode_uri(text: &str, keep: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() || URI_UNRESERVED.contains(character) || keep.contains(character) {
            encoded.push(character);
        } else {
            let mut buffer = [0; 4];
            for byte in character.encode_utf8(&mut buffer).bytes() {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    encoded
}

/// `None` when an escape is malformed or the bytes are not UTF-8.
pub fn decode_uri(text: &str, keep: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] != b'%' {
            decoded.push(bytes[index]);
            index += 1;
            continue;
        }
        let hex = text.get(index + 1..index + 3)?;
        let byte = u8::from_str_radix(hex, 16).ok()?;
        if byte.is_ascii() && keep.contains(byte as char) {
            decoded.extend_from_slice(&bytes[index..index + 3]);
        } else {
            decoded.push(byte);
        }
        index += 3;
    }
    String::from_utf8(decoded).ok()
}

fn parse_int_native(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = string_argument(interpreter, &call, 0)?;
    let radix = interpreter.to_int32(&call.argument(1))?;
    Ok(Value::Number(parse_int(&text, radix)))
}

fn parse_float_native(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = string_argument(interpreter, &call, 0)?;
    Ok(Value::Number(parse_float(&text)))
}

fn is_nan(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(interpreter.to_number(&call.argument(0))?.is_nan()))
}

fn is_finite(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(interpreter.to_number(&call.argument(0))?.is_finite()))
}

fn encode_uri_native(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = string_argument(interpreter, &call, 0)?;
    Ok(Value::from(encode_uri(&text, URI_RESERVED)))
}

fn encode_uri_component(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = string_argument(interpreter, &call, 0)?;
    Ok(Value::from(encode_uri(&text, "")))
}

fn decode(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, keep: &str) -> Result<Value, Interrupt> {
    let text = string_argument(interpreter, call, 0)?;
    match decode_uri(&text, keep) {
        Some(decoded) => Ok(Value::from(decoded)),
        None => Err(interpreter.throw(ErrorKind::Uri, "URI malformed")),
    }
}

fn decode_uri_native(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    decode(interpreter, &call, URI_RESERVED)
}

fn decode_uri_component(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    decode(interpreter, &call, "")
}

pub fn install(builder: &mut Builder<'_>) {
    let functions: [(&'static str, crate::sandbox::value::NativeFn); 8] = [
        ("parseInt", parse_int_native),
        ("parseFloat", parse_float_native),
        ("isNaN", is_nan),
        ("isFinite", is_finite),
        ("encodeURI", encode_uri_native),
        ("decodeURI", decode_uri_native),
        ("encodeURIComponent", encode_uri_component),
        ("decodeURIComponent", decode_uri_component),
    ];
    for (name, call) in functions {
        let function = builder.function(name, call);
        builder.global(name, function);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_prefixes() {
        assert_eq!(parse_int("  42px", 0), 42.0);
        assert_eq!(parse_int("-0x1f", 0), -31.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("px", 10).is_nan());
        assert!(parse_int("1", 40).is_nan());
    }

    #[test]
    fn parse_float_prefixes() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn uri_coding() {
        assert_eq!(encode_uri("a b/é?", ""), "a%20b%2F%C3%A9%3F");
        assert_eq!(encode_uri("a b/é?", URI_RESERVED), "a%20b/%C3%A9?");
        assert_eq!(decode_uri("a%20b%2F%C3%A9", "").as_deref(), Some("a b/é"));
        assert_eq!(decode_uri("%2F", URI_RESERVED).as_deref(), Some("%2F"));
        assert_eq!(decode_uri("%E0%A4%A", ""), None);
    }
}
