//! `Number` and `Boolean`.

use super::global::{parse_float, parse_int};
use super::{Builder, integer_argument, string_argument};
use crate::parser::number_to_string;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, Value};

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Renders `number` in `radix`, with up to 52 fraction digits.
pub fn to_radix(number: f64, radix: u32) -> String {
    if radix == 10 || !number.is_finite() {
        return number_to_string(number);
    }
    let digit = |value: f64| char::from_digit(value as u32, radix).unwrap_or('0');
    let base = f64::from(radix);
    let mut integer = number.abs().trunc();
    let mut fraction = number.abs() - integer;
    let mut digits = Vec::new();
    while integer >= 1.0 {
        digits.push(digit(integer % base));
        integer = (integer / base).trunc();
    }
    if digits.is_empty() {
        digits.push('0');
    }
    if number < 0.0 {
        digits.push('-');
    }
    let mut rendered: String = digits.into_iter().rev().collect();
    if fraction > 0.0 {
        rendered.push('.');
        for _ in 0..52 {
            fraction *= base;
            let whole = fraction.trunc();
            rendered.push(digit(whole));
            fraction -= whole;
            if fraction == 0.0 {
                break;
            }
        }
    }
    rendered
}

fn convert(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    match call.arguments.first() {
        None => Ok(Value::Number(0.0)),
        Some(value) => Ok(Value::Number(interpreter.to_number(value)?)),
    }
}

fn is_integer(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(matches!(call.argument(0), Value::Number(number) if number.is_finite() && number.fract() == 0.0)))
}

fn is_safe_integer(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(matches!(
        call.argument(0),
        Value::Number(number) if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER
    )))
}

fn is_finite(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(matches!(call.argument(0), Value::Number(number) if number.is_finite())))
}

fn is_nan(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(matches!(call.argument(0), Value::Number(number) if number.is_nan())))
}

fn number_parse_float(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = string_argument(interpreter, &call, 0)?;
    Ok(Value::Number(parse_float(&text)))
}

fn number_parse_int(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = string_argument(interpreter, &call, 0)?;
    let radix = interpreter.to_int32(&call.argument(1))?;
    Ok(Value::Number(parse_int(&text, radix)))
}

fn this_number(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str) -> Result<f64, Interrupt> {
    match call.this {
        Value::Number(number) => Ok(number),
        _ => Err(interpreter.throw(
            ErrorKind::Type,
            format!("Number.prototype.{method} requires that 'this' be a Number"),
        )),
    }
}

fn to_fixed(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let number = this_number(interpreter, &call, "toFixed")?;
    let digits = integer_argument(interpreter, &call, 0, 0.0)?;
    if !(0.0..=100.0).contains(&digits) {
        return Err(interpreter.throw(ErrorKind::Range, "toFixed() digits argument must be between 0 and 100"));
    }
    if !number.is_finite() || number.abs() >= 1e21 {
        return Ok(Value::from(number_to_string(number)));
    }
    let fixed = format!("{:.*}", digits as usize, number);
    // `(-0.0001).toFixed(2)` keeps its sign, but `(-0).toFixed(2)` does not.
    let fixed = if number == 0.0 { fixed.trim_start_matches('-').to_string() } else { fixed };
    Ok(Value::from(fixed))
}

fn to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let number = this_number(interpreter, &call, "toString")?;
    let radix = integer_argument(interpreter, &call, 0, 10.0)?;
    if !(2.0..=36.0).contains(&radix) {
        return Err(interpreter.throw(ErrorKind::Range, "toString() radix must be between 2 and 36"));
    }
    Ok(Value::from(to_radix(number, radix as u32)))
}

fn value_of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Number(this_number(interpreter, &call, "valueOf")?))
}

fn convert_boolean(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(call.argument(0).is_truthy()))
}

fn this_boolean(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str) -> Result<bool, Interrupt> {
    match call.this {
        Value::Boolean(boolean) => Ok(boolean),
        _ => Err(interpreter.throw(
            ErrorKind::Type,
            format!("Boolean.prototype.{method} requires that 'this' be a Boolean"),
        )),
    }
}

fn boolean_to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::from(this_boolean(interpreter, &call, "toString")?.to_string()))
}

fn boolean_value_of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(this_boolean(interpreter, &call, "valueOf")?))
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().number_prototype.clone();
    builder.method(&prototype, "toFixed", to_fixed);
    builder.method(&prototype, "toString", to_string);
    builder.method(&prototype, "valueOf", value_of);

    let number = builder.constructor("Number", &prototype, convert, None);
    builder.method(&number, "isInteger", is_integer);
    builder.method(&number, "isSafeInteger", is_safe_integer);
    builder.method(&number, "isFinite", is_finite);
    builder.method(&number, "isNaN", is_nan);
    builder.method(&number, "parseFloat", number_parse_float);
    builder.method(&number, "parseInt", number_parse_int);
    builder.constant(&number, "MAX_SAFE_INTEGER", MAX_SAFE_INTEGER);
    builder.constant(&number, "MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER);
    builder.constant(&number, "EPSILON", f64::EPSILON);
    builder.constant(&number, "MAX_VALUE", f64::MAX);
    builder.constant(&number, "MIN_VALUE", 5e-324);
    builder.constant(&number, "POSITIVE_INFINITY", f64::INFINITY);
    builder.constant(&number, "NEGATIVE_INFINITY", f64::NEG_INFINITY);
    builder.constant(&number, "NaN", f64::NAN);
    builder.global("Number", number);

    let prototype = builder.realm().boolean_prototype.clone();
    builder.method(&prototype, "toString", boolean_to_string);
    builder.method(&prototype, "valueOf", boolean_value_of);
    let boolean = builder.constructor("Boolean", &prototype, convert_boolean, None);
    builder.global("Boolean", boolean);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_rendering() {
        assert_eq!(to_radix(255.0, 16), "ff");
        assert_eq!(to_radix(-5.0, 2), "-101");
        assert_eq!(to_radix(0.5, 2), "0.1");
        assert_eq!(to_radix(0.0, 36), "0");
        assert_eq!(to_radix(35.0, 36), "z");
        assert_eq!(to_radix(f64::NAN, 2), "NaN");
    }
}
