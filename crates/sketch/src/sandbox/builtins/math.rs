use super::Builder;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, NativeFn, Value};
use std::f64::consts;

macro_rules! unary {
    ($($name:ident => $operation:expr),* $(,)?) => {
        $(
            fn $name(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
                let operation: fn(f64) -> f64 = $operation;
                Ok(Value::Number(operation(interpreter.to_number(&call.argument(0))?)))
            }
        )*
    };
}

unary! {
    abs => f64::abs,
    floor => f64::floor,
    ceil => f64::ceil,
    round => round_half_up,
    trunc => f64::trunc,
    sign => sign_of,
    sqrt => f64::sqrt,
    cbrt => f64::cbrt,
    log => f64::ln,
    log2 => f64::log2,
    log10 => f64::log10,
    exp => f64::exp,
    sin => f64::sin,
    cos => f64::cos,
    tan => f64::tan,
    asin => f64::asin,
    acos => f64::acos,
    atan => f64::atan,
    fround => |number| f64::from(number as f32),
}

/// Ties round toward positive infinity: `-2.5` becomes `-2`.
fn round_half_up(number: f64) -> f64 {
    if !number.is_finite() || number.fract() == 0.0 {
        return number;
    }
    let floor = number.floor();
    if number - floor >= 0.5 { floor + 1.0 } else { floor }
}

fn sign_of(number: f64) -> f64 {
    if number.is_nan() || number == 0.0 { number } else { number.signum() }
}

fn power(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

fn numbers(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>) -> Result<Vec<f64>, Interrupt> {
    call.arguments
        .iter()
        .map(|argument| interpreter.to_number(argument))
        .collect()
}

fn pow(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let base = interpreter.to_number(&call.argument(0))?;
    let exponent = interpreter.to_number(&call.argument(1))?;
    Ok(Value::Number(power(base, exponent)))
}

fn atan2(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let y = interpreter.to_number(&call.argument(0))?;
    let x = interpreter.to_number(&call.argument(1))?;
    Ok(Value::Number(y.atan2(x)))
}

fn min(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let numbers = numbers(interpreter, &call)?;
    Ok(Value::Number(numbers.into_iter().fold(f64::INFINITY, |lowest, number| {
        if lowest.is_nan() || number.is_nan() { f64::NAN } else { lowest.min(number) }
    })))
}

fn max(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let numbers = numbers(interpreter, &call)?;
    Ok(Value::Number(numbers.into_iter().fold(f64::NEG_INFINITY, |highest, number| {
        if highest.is_nan() || number.is_nan() { f64::NAN } else { highest.max(number) }
    })))
}

fn hypot(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let numbers = numbers(interpreter, &call)?;
    if numbers.iter().any(|number| number.is_infinite()) {
        return Ok(Value::Number(f64::INFINITY));
    }
    Ok(Value::Number(numbers.iter().map(|number| number * number).sum::<f64>().sqrt()))
}

fn random(interpreter: &mut Interpreter<'_>, _: NativeCall<'_>) -> Result<Value, Interrupt> {
    match getrandom::u64() {
        // 53 random bits scaled into [0, 1).
        Ok(bits) => Ok(Value::Number((bits >> 11) as f64 / (1u64 << 53) as f64)),
        Err(error) => Err(interpreter.throw(ErrorKind::Error, format!("Random source unavailable: {error}"))),
    }
}

pub fn install(builder: &mut Builder<'_>) {
    let math = builder.namespace();
    let functions: [(&str, NativeFn); 25] = [
        ("abs", abs),
        ("floor", floor),
        ("ceil", ceil),
        ("round", round),
        ("trunc", trunc),
        ("sign", sign),
        ("sqrt", sqrt),
        ("cbrt", cbrt),
        ("log", log),
        ("log2", log2),
        ("log10", log10),
        ("exp", exp),
        ("sin", sin),
        ("cos", cos),
        ("tan", tan),
        ("asin", asin),
        ("acos", acos),
        ("atan", atan),
        ("pow", pow),
        ("atan2", atan2),
        ("min", min),
        ("max", max),
        ("hypot", hypot),
        ("random", random),
        ("fround", fround),
    ];
    for (name, call) in functions {
        builder.method(&math, name, call);
    }
    let constants = [
        ("PI", consts::PI),
        ("E", consts::E),
        ("LN2", consts::LN_2),
        ("LN10", consts::LN_10),
        ("LOG2E", consts::LOG2_E),
        ("LOG10E", consts::LOG10_E),
        ("SQRT2", consts::SQRT_2),
        ("SQRT1_2", consts::FRAC_1_SQRT_2),
    ];
    for (name, value) in constants {
        builder.constant(&math, name, value);
    }
    builder.global("Math", math);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_ties_go_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert_eq!(round_half_up(7.0), 7.0);
    }

    #[test]
    fn power_edge_cases() {
        assert!(power(1.0, f64::NAN).is_nan());
        assert!(power(-1.0, f64::INFINITY).is_nan());
        assert_eq!(power(2.0, 10.0), 1024.0);
        assert_eq!(power(f64::NAN, 0.0), 1.0);
    }
}
