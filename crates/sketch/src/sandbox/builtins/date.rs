//! `Date`, always in UTC.

use super::Builder;
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::operations::Hint;
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, NativeFn, ObjectKind, Value};
use std::time::{SystemTime, UNIX_EPOCH};

const MS_PER_DAY: f64 = 86_400_000.0;
const MAX_TIME: f64 = 8.64e15;
const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

const ISO_PATTERN: &str = r"^([+-]\d{6}|\d{4})(?:-(\d{2})(?:-(\d{2}))?)?(?:T(\d{2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?(Z|[+-]\d{2}:\d{2})?)?$";

pub fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_millis() as f64)
}

fn time_clip(time: f64) -> f64 {
    if !time.is_finite() || time.abs() > MAX_TIME {
        return f64::NAN;
    }
    time.trunc() + 0.0
}

/// Days since the epoch for a proleptic Gregorian date; `month` counts from 0.
pub fn days_from_civil(year: f64, month: f64, day: f64) -> f64 {
    let year = year + (month / 12.0).floor();
    let month = month.rem_euclid(12.0) + 1.0;
    let year = if month <= 2.0 { year - 1.0 } else { year };
    let era = (year / 400.0).floor();
    let year_of_era = year - era * 400.0;
    let shifted_month = if month > 2.0 { month - 3.0 } else { month + 9.0 };
    let day_of_year = ((153.0 * shifted_month + 2.0) / 5.0).floor() + day - 1.0;
    let day_of_era = year_of_era * 365.0 + (year_of_era / 4.0).floor() - (year_of_era / 100.0).floor() + day_of_year;
    era * 146_097.0 + day_of_era - 719_468.0
}

/// Broken-down UTC time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Civil {
    pub year: f64,
    /// 0 for January.
    pub month: f64,
    pub day: f64,
    /// 0 for Sunday.
    pub weekday: f64,
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
    pub milliseconds: f64,
}

impl Civil {
    pub fn from_time(time: f64) -> Self {
        let days = (time / MS_PER_DAY).floor();
        let within_day = time - days * MS_PER_DAY;
        let shifted = days + 719_468.0;
        let era = (shifted / 146_097.0).floor();
        let day_of_era = shifted - era * 146_097.0;
        let year_of_era =
            ((day_of_era - (day_of_era / 1460.0).floor() + (day_of_era / 36_524.0).floor() - (day_of_era / 146_096.0).floor())
                / 365.0)
                .floor();
        let day_of_year = day_of_era - (365.0 * year_of_era + (year_of_era / 4.0).floor() - (year_of_era / 100.0).floor());
        let shifted_month = ((5.0 * day_of_year + 2.0) / 153.0).floor();
        let day = day_of_year - ((153.0 * shifted_month + 2.0) / 5.0).floor() + 1.0;
        let month = if shifted_month < 10.0 { shifted_month + 2.0 } else { shifted_month - 10.0 };
        let year = year_of_era + era * 400.0 + if month <= 1.0 { 1.0 } else { 0.0 };
        Self {
            year,
            month,
            day,
            weekday: (days + 4.0).rem_euclid(7.0),
            hours: (within_day / 3_600_000.0).floor(),
            minutes: (within_day / 60_000.0).floor() % 60.0,
            seconds: (within_day / 1000.0).floor() % 60.0,
            milliseconds: within_day % 1000.0,
        }
    }
}

fn make_time(year: f64, month: f64, day: f64, hours: f64, minutes: f64, seconds: f64, milliseconds: f64) -> f64 {
    let parts = [year, month, day, hours, minutes, seconds, milliseconds];
    if parts.iter().any(|part| !part.is_finite()) {
        return f64::NAN;
    }
    let days = days_from_civil(year.trunc(), month.trunc(), day.trunc());
    time_clip(days * MS_PER_DAY + hours.trunc() * 3_600_000.0 + minutes.trunc() * 60_000.0 + seconds.trunc() * 1000.0 + milliseconds.trunc())
}

/// Parses the ISO 8601 forms `Date` accepts; NaN otherwise.
pub fn parse_iso(text: &str) -> f64 {
    let Ok(pattern) = regex::Regex::new(ISO_PATTERN) else {
        return f64::NAN;
    };
    let Some(captures) = pattern.captures(text.trim()) else {
        return f64::NAN;
    };
    let number = |index: usize, default: f64| {
        captures
            .get(index)
            .map_or(Some(default), |group| group.as_str().parse::<f64>().ok())
    };
    let fraction = captures.get(7).map_or(0.0, |group| {
        let digits = &group.as_str()[..group.as_str().len().min(3)];
        let scale = 10f64.powi(3 - digits.len() as i32);
        digits.parse::<f64>().unwrap_or(0.0) * scale
    });
    let (Some(year), Some(month), Some(day), Some(hours), Some(minutes), Some(seconds)) = (
        number(1, 0.0),
        number(2, 1.0),
        number(3, 1.0),
        number(4, 0.0),
        number(5, 0.0),
        number(6, 0.0),
    ) else {
        return f64::NAN;
    };
    if !(1.0..=12.0).contains(&month) || !(1.0..=31.0).contains(&day) || hours > 24.0 || minutes > 59.0 || seconds > 59.0 {
        return f64::NAN;
    }
    let offset = match captures.get(8).map(|group| group.as_str()) {
        None | Some("Z") => 0.0,
        Some(zone) => {
            let sign = if zone.starts_with('-') { -1.0 } else { 1.0 };
            let hours: f64 = zone[1..3].parse().unwrap_or(0.0);
            let minutes: f64 = zone[4..6].parse().unwrap_or(0.0);
            sign * (hours * 60.0 + minutes) * 60_000.0
        }
    };
    make_time(year, month - 1.0, day, hours, minutes, seconds, fraction) - offset
}

pub fn to_iso_string(time: f64) -> Option<String> {
    if time.is_nan() {
        return None;
    }
    let civil = Civil::from_time(time);
    let year = if (0.0..=9999.0).contains(&civil.year) {
        format!("{:04}", civil.year)
    } else {
        format!("{}{:06}", if civil.year < 0.0 { '-' } else { '+' }, civil.year.abs())
    };
    Some(format!(
        "{year}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        civil.month + 1.0,
        civil.day,
        civil.hours,
        civil.minutes,
        civil.seconds,
        civil.milliseconds
    ))
}

fn to_display_string(time: f64) -> String {
    if time.is_nan() {
        return "Invalid Date".to_string();
    }
    let civil = Civil::from_time(time);
    format!(
        "{} {} {:02} {:04} {:02}:{:02}:{:02} GMT+0000 (Coordinated Universal Time)",
        DAYS[civil.weekday as usize],
        MONTHS[civil.month as usize],
        civil.day,
        civil.year,
        civil.hours,
        civil.minutes,
        civil.seconds
    )
}

fn time_value(interpreter: &mut Interpreter<'_>, value: &Value) -> Result<f64, Interrupt> {
    if let Value::Object(object) = value
        && let ObjectKind::Date(time) = object.borrow().kind
    {
        return Ok(time);
    }
    match interpreter.to_primitive(value, Hint::Default)? {
        Value::String(text) => Ok(parse_iso(&text)),
        primitive => Ok(time_clip(interpreter.to_number(&primitive)?)),
    }
}

fn construct(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let time = match call.arguments {
        [] => now_millis(),
        [value] => time_value(interpreter, value)?,
        components => {
            let mut numbers = [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
            for (slot, component) in numbers.iter_mut().zip(components) {
                *slot = interpreter.to_number(component)?;
            }
            let [year, month, day, hours, minutes, seconds, milliseconds] = numbers;
            let year = if (0.0..=99.0).contains(&year.trunc()) { 1900.0 + year.trunc() } else { year };
            make_time(year, month, day, hours, minutes, seconds, milliseconds)
        }
    };
    if let Value::Object(this) = &call.this {
        this.borrow_mut().kind = ObjectKind::Date(time);
    }
    Ok(call.this)
}

/// `Date()` called as a function returns the current time as a string.
fn call_date(_: &mut Interpreter<'_>, _: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::from(to_display_string(now_millis())))
}

fn now(_: &mut Interpreter<'_>, _: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Number(now_millis()))
}

fn parse(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let text = interpreter.to_string(&call.argument(0))?;
    Ok(Value::Number(parse_iso(&text)))
}

fn this_time(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>) -> Result<f64, Interrupt> {
    if let Value::Object(object) = &call.this
        && let ObjectKind::Date(time) = object.borrow().kind
    {
        return Ok(time);
    }
    Err(interpreter.throw(ErrorKind::Type, "this is not a Date object."))
}

fn get_time(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Number(this_time(interpreter, &call)?))
}

fn to_iso(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let time = this_time(interpreter, &call)?;
    match to_iso_string(time) {
        Some(iso) => Ok(Value::from(iso)),
        None => Err(interpreter.throw(ErrorKind::Range, "Invalid time value")),
    }
}

fn to_json(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let time = this_time(interpreter, &call)?;
    Ok(to_iso_string(time).map(Value::from).unwrap_or(Value::Null))
}

fn to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let time = this_time(interpreter, &call)?;
    Ok(Value::from(to_display_string(time)))
}

macro_rules! getters {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            fn $name(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
                let time = this_time(interpreter, &call)?;
                if time.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                Ok(Value::Number(Civil::from_time(time).$field))
            }
        )*
    };
}

getters! {
    get_full_year => year,
    get_month => month,
    get_date => day,
    get_day => weekday,
    get_hours => hours,
    get_minutes => minutes,
    get_seconds => seconds,
    get_milliseconds => milliseconds,
}

fn get_timezone_offset(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let time = this_time(interpreter, &call)?;
    Ok(Value::Number(if time.is_nan() { f64::NAN } else { 0.0 }))
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().date_prototype.clone();
    let getters: [(&str, &str, NativeFn); 8] = [
        ("getFullYear", "getUTCFullYear", get_full_year),
        ("getMonth", "getUTCMonth", get_month),
        ("getDate", "getUTCDate", get_date),
        ("getDay", "getUTCDay", get_day),
        ("getHours", "getUTCHours", get_hours),
        ("getMinutes", "getUTCMinutes", get_minutes),
        ("getSeconds", "getUTCSeconds", get_seconds),
        ("getMilliseconds", "getUTCMilliseconds", get_milliseconds),
    ];
    for (local, utc, call) in getters {
        builder.method(&prototype, local, call);
        builder.method(&prototype, utc, call);
    }
    builder.method(&prototype, "getTime", get_time);
    builder.method(&prototype, "valueOf", get_time);
    builder.method(&prototype, "getTimezoneOffset", get_timezone_offset);
    builder.method(&prototype, "toISOString", to_iso);
    builder.method(&prototype, "toJSON", to_json);
    builder.method(&prototype, "toString", to_string);

    let date = builder.constructor("Date", &prototype, call_date, Some(construct));
    builder.method(&date, "now", now);
    builder.method(&date, "parse", parse);
    builder.global("Date", date);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_round_trip() {
        assert_eq!(days_from_civil(1970.0, 0.0, 1.0), 0.0);
        assert_eq!(days_from_civil(2000.0, 2.0, 1.0), 11_017.0);
        let civil = Civil::from_time(951_782_400_000.0 + 3_723_004.0);
        assert_eq!((civil.year, civil.month, civil.day), (2000.0, 1.0, 29.0));
        assert_eq!((civil.hours, civil.minutes, civil.seconds, civil.milliseconds), (1.0, 2.0, 3.0, 4.0));
        assert_eq!(civil.weekday, 2.0);
    }

    #[test]
    fn times_before_the_epoch() {
        let civil = Civil::from_time(-1.0);
        assert_eq!((civil.year, civil.month, civil.day), (1969.0, 11.0, 31.0));
        assert_eq!(civil.milliseconds, 999.0);
    }

    #[test]
    fn iso_strings() {
        assert_eq!(parse_iso("1970-01-01T00:00:00.000Z"), 0.0);
        assert_eq!(parse_iso("2000-02-29"), 951_782_400_000.0);
        assert_eq!(parse_iso("2000-02-29T01:00:00+01:00"), 951_782_400_000.0);
        assert!(parse_iso("yesterday").is_nan());
        assert_eq!(to_iso_string(951_782_400_000.0 + 5.0).as_deref(), Some("2000-02-29T00:00:00.005Z"));
        assert_eq!(to_iso_string(f64::NAN), None);
    }

    #[test]
    fn display_form() {
        assert_eq!(to_display_string(0.0), "Thu Jan 01 1970 00:00:00 GMT+0000 (Coordinated Universal Time)");
        assert_eq!(to_display_string(f64::NAN), "Invalid Date");
    }
}
