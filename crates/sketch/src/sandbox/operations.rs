//! Property access, type conversions and operators.

use super::interpreter::{Interpreter, Interrupt};
use super::realm::ErrorKind;
use super::value::{Accessor, Function, ObjectKind, ObjectRef, Property, PropertyKey, Value};
use crate::parser::{BinaryOperator, number_to_string};
use indexmap::map::Entry;
use std::cmp::Ordering;
use std::rc::Rc;

/// Arrays longer than this are refused instead of allocated.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

/// What a read of `key` along the prototype chain finds.
pub enum Lookup {
    Value(Value),
    Accessor(Accessor),
}

pub fn lookup_property(object: &ObjectRef, key: &PropertyKey) -> Lookup {
    let mut current = object.clone();
    loop {
        let next = {
            let borrowed = current.borrow();
            if let Some(value) = borrowed.exotic(key) {
                return Lookup::Value(value);
            }
            if let Some(property) = borrowed.properties.get(key) {
                return match &property.accessor {
                    Some(accessor) => Lookup::Accessor(accessor.clone()),
                    None => Lookup::Value(property.value.clone()),
                };
            }
            borrowed.prototype.clone()
        };
        match next {
            Some(next) => current = next,
            None => return Lookup::Value(Value::Undefined),
        }
    }
}

pub fn has_property(object: &ObjectRef, key: &PropertyKey) -> bool {
    let mut current = object.clone();
    loop {
        let next = {
            let borrowed = current.borrow();
            if borrowed.has_own(key) {
                return true;
            }
            borrowed.prototype.clone()
        };
        match next {
            Some(next) => current = next,
            None => return false,
        }
    }
}

/// `Number(text)` for a string.
pub fn string_to_number(text: &str) -> f64 {
    let text = text.trim_matches(|character: char| character.is_whitespace() || character == '\u{feff}');
    if text.is_empty() {
        return 0.0;
    }
    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match text.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &text[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        return digits.chars().try_fold(0.0, |total: f64, character| {
            character.to_digit(radix).map(|digit| total * f64::from(radix) + f64::from(digit))
        })
        .unwrap_or(f64::NAN);
    }
    let valid = text.chars().all(|character| matches!(character, '0'..='9' | '.' | 'e' | 'E' | '+' | '-'))
        && text.chars().any(|character| character.is_ascii_digit());
    if !valid {
        return f64::NAN;
    }
    text.parse().unwrap_or(f64::NAN)
}

impl Interpreter<'_> {
    pub fn get(&mut self, target: &Value, key: &PropertyKey) -> Result<Value, Interrupt> {
        let object = match target {
            Value::Undefined | Value::Null => {
                let found = if matches!(target, Value::Null) { "null" } else { "undefined" };
                return Err(self.throw(
                    ErrorKind::Type,
                    format!("Cannot read properties of {found} (reading '{key}')"),
                ));
            }
            Value::String(text) => {
                if key.as_str() == Some("length") {
                    return Ok(Value::from(text.chars().count()));
                }
                if let Some(index) = key.array_index() {
                    return Ok(text
                        .chars()
                        .nth(index)
                        .map(|character| Value::from(character.to_string()))
                        .unwrap_or_default());
                }
                self.realm.string_prototype.clone()
            }
            Value::Number(_) => self.realm.number_prototype.clone(),
            Value::Boolean(_) => self.realm.boolean_prototype.clone(),
            Value::Symbol(symbol) => {
                if key.as_str() == Some("description") {
                    return Ok(symbol.description.clone().map(Value::String).unwrap_or_default());
                }
                self.realm.symbol_prototype.clone()
            }
            Value::Object(object) => object.clone(),
        };
        match lookup_property(&object, key) {
            Lookup::Value(value) => Ok(value),
            Lookup::Accessor(Accessor { get: Some(getter), .. }) => self.call(&getter, target.clone(), &[]),
            Lookup::Accessor(_) => Ok(Value::Undefined),
        }
    }

    pub fn get_named(&mut self, target: &Value, key: &str) -> Result<Value, Interrupt> {
        self.get(target, &PropertyKey::from(key))
    }

    pub fn set(&mut self, target: &Value, key: PropertyKey, value: Value) -> Result<(), Interrupt> {
        let object = match target {
            Value::Undefined | Value::Null => {
                let found = self.describe(target);
                return Err(self.throw(
                    ErrorKind::Type,
                    format!("Cannot set properties of {found} (setting '{key}')"),
                ));
            }
            Value::Object(object) => object,
            _ => return Ok(()),
        };
        if object.borrow().frozen {
            return Err(self.throw(
                ErrorKind::Type,
                format!("Cannot assign to read only property '{key}' of object"),
            ));
        }
        if let Lookup::Accessor(accessor) = lookup_property(object, &key) {
            return match accessor.set {
                Some(setter) => self.call(&setter, target.clone(), &[value]).map(drop),
                None => Ok(()),
            };
        }
        let is_array = matches!(object.borrow().kind, ObjectKind::Array(_));
        if is_array {
            if key.as_str() == Some("length") {
                let length = self.to_number(&value)?;
                let length = self.array_length(length)?;
                if let ObjectKind::Array(items) = &mut object.borrow_mut().kind {
                    items.resize(length, Value::Undefined);
                }
                return Ok(());
            }
            if let Some(index) = key.array_index() {
                if index >= MAX_ARRAY_LENGTH {
                    return Err(self.throw(ErrorKind::Range, "Invalid array length"));
                }
                if let ObjectKind::Array(items) = &mut object.borrow_mut().kind {
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
                return Ok(());
            }
        }
        match object.borrow_mut().properties.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().value = value,
            Entry::Vacant(entry) => {
                entry.insert(Property::enumerable(value));
            }
        }
        Ok(())
    }

    pub fn set_named(&mut self, target: &Value, key: &str, value: Value) -> Result<(), Interrupt> {
        self.set(target, PropertyKey::from(key), value)
    }

    pub fn array_length(&mut self, length: f64) -> Result<usize, Interrupt> {
        if length < 0.0 || length.fract() != 0.0 || length >= MAX_ARRAY_LENGTH as f64 {
            return Err(self.throw(ErrorKind::Range, "Invalid array length"));
        }
        Ok(length as usize)
    }

    pub fn delete(&mut self, target: &Value, key: &PropertyKey) -> Result<bool, Interrupt> {
        let Value::Object(object) = target else {
            if target.is_nullish() {
                let found = self.describe(target);
                return Err(self.throw(
                    ErrorKind::Type,
                    format!("Cannot convert {found} to object"),
                ));
            }
            return Ok(true);
        };
        if object.borrow().frozen {
            return Err(self.throw(
                ErrorKind::Type,
                format!("Cannot delete property '{key}' of {}", self.describe(target)),
            ));
        }
        let mut object = object.borrow_mut();
        if let (ObjectKind::Array(items), Some(index)) = (&mut object.kind, key.array_index()) {
            if let Some(item) = items.get_mut(index) {
                *item = Value::Undefined;
            }
            return Ok(true);
        }
        object.properties.shift_remove(key);
        Ok(true)
    }

    /// Keys `Object.keys` reports for any value.
    pub fn enumerable_keys(&self, target: &Value) -> Vec<PropertyKey> {
        match target {
            Value::Object(object) => object.borrow().enumerable_keys(),
            Value::String(text) => (0..text.chars().count()).map(PropertyKey::from).collect(),
            _ => Vec::new(),
        }
    }

    // Conversions.

    pub fn to_primitive(&mut self, value: &Value, hint: Hint) -> Result<Value, Interrupt> {
        let Value::Object(object) = value else {
            return Ok(value.clone());
        };
        let is_date = matches!(object.borrow().kind, ObjectKind::Date(_));
        let order = match (hint, is_date) {
            (Hint::String, _) | (Hint::Default, true) => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get_named(value, name)?;
            if method.is_callable() {
                let result = self.call(&method, value.clone(), &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.throw(ErrorKind::Type, "Cannot convert object to primitive value"))
    }

    pub fn to_string(&mut self, value: &Value) -> Result<Rc<str>, Interrupt> {
        Ok(match value {
            Value::Undefined => Rc::from("undefined"),
            Value::Null => Rc::from("null"),
            Value::Boolean(boolean) => Rc::from(boolean.to_string()),
            Value::Number(number) => Rc::from(number_to_string(*number)),
            Value::String(text) => text.clone(),
            Value::Symbol(_) => {
                return Err(self.throw(ErrorKind::Type, "Cannot convert a Symbol value to a string"));
            }
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::String)?;
                return self.to_string(&primitive);
            }
        })
    }

    pub fn to_number(&mut self, value: &Value) -> Result<f64, Interrupt> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(boolean) => f64::from(u8::from(*boolean)),
            Value::Number(number) => *number,
            Value::String(text) => string_to_number(text),
            Value::Symbol(_) => {
                return Err(self.throw(ErrorKind::Type, "Cannot convert a Symbol value to a number"));
            }
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    /// ToIntegerOrInfinity.
    pub fn to_integer(&mut self, value: &Value) -> Result<f64, Interrupt> {
        let number = self.to_number(value)?;
        Ok(if number.is_nan() { 0.0 } else { number.trunc() })
    }

    pub fn to_int32(&mut self, value: &Value) -> Result<i32, Interrupt> {
        Ok(self.to_uint32(value)? as i32)
    }

    pub fn to_uint32(&mut self, value: &Value) -> Result<u32, Interrupt> {
        let number = self.to_number(value)?;
        if !number.is_finite() {
            return Ok(0);
        }
        let wrapped = number.trunc().rem_euclid(4_294_967_296.0);
        Ok(wrapped as u32)
    }

    pub fn to_property_key(&mut self, value: &Value) -> Result<PropertyKey, Interrupt> {
        match value {
            Value::Symbol(symbol) => Ok(PropertyKey::Symbol(symbol.clone())),
            Value::Number(number) if number.fract() == 0.0 && *number >= 0.0 && *number < 1e15 => {
                Ok(PropertyKey::from(*number as usize))
            }
            other => Ok(PropertyKey::String(self.to_string(other)?)),
        }
    }

    /// Short description of a value for error messages.
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::String(text) => format!("\"{text}\""),
            Value::Symbol(symbol) => symbol.to_string(),
            Value::Object(object) => {
                let object = object.borrow();
                match &object.kind {
                    ObjectKind::Function(Function::Native(native)) => format!("function {}", native.name),
                    ObjectKind::Function(_) => "function".to_string(),
                    kind => format!("#<{}>", kind.class_name()),
                }
            }
            Value::Number(number) => number_to_string(*number),
            Value::Boolean(boolean) => boolean.to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
        }
    }

    /// Snapshot of the values `for...of` and spread walk over.
    pub fn iterate(&mut self, value: &Value) -> Result<Vec<Value>, Interrupt> {
        match value {
            Value::String(text) => Ok(text.chars().map(|character| Value::from(character.to_string())).collect()),
            Value::Object(object) => {
                let pairs = match &object.borrow().kind {
                    ObjectKind::Array(items) => return Ok(items.clone()),
                    ObjectKind::Set(entries) => return Ok(entries.entries.values().map(|(key, _)| key.clone()).collect()),
                    ObjectKind::Map(entries) => entries
                        .entries
                        .values()
                        .map(|(key, value)| vec![key.clone(), value.clone()])
                        .collect::<Vec<_>>(),
                    _ => {
                        let found = self.describe(value);
                        return Err(self.throw(ErrorKind::Type, format!("{found} is not iterable")));
                    }
                };
                Ok(pairs.into_iter().map(|pair| self.array(pair)).collect())
            }
            _ => {
                let found = self.describe(value);
                Err(self.throw(ErrorKind::Type, format!("{found} is not iterable")))
            }
        }
    }

    pub fn instance_of(&mut self, value: &Value, constructor: &Value) -> Result<bool, Interrupt> {
        if !constructor.is_callable() {
            return Err(self.throw(ErrorKind::Type, "Right-hand side of 'instanceof' is not callable"));
        }
        let Value::Object(object) = value else {
            return Ok(false);
        };
        let Value::Object(prototype) = self.get_named(constructor, "prototype")? else {
            return Ok(false);
        };
        let mut current = object.borrow().prototype.clone();
        while let Some(candidate) = current {
            if Rc::ptr_eq(&candidate, &prototype) {
                return Ok(true);
            }
            current = candidate.borrow().prototype.clone();
        }
        Ok(false)
    }

    pub fn loose_equals(&mut self, left: &Value, right: &Value) -> Result<bool, Interrupt> {
        Ok(match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::String(text)) => left.strict_equals(&Value::Number(string_to_number(text))),
            (Value::String(text), Value::Number(_)) => Value::Number(string_to_number(text)).strict_equals(right),
            (Value::Boolean(boolean), _) => {
                return self.loose_equals(&Value::Number(f64::from(u8::from(*boolean))), right);
            }
            (_, Value::Boolean(boolean)) => {
                return self.loose_equals(left, &Value::Number(f64::from(u8::from(*boolean))));
            }
            (Value::Object(_), Value::Object(_)) => left.strict_equals(right),
            (Value::Object(_), _) => {
                let primitive = self.to_primitive(left, Hint::Default)?;
                return self.loose_equals(&primitive, right);
            }
            (_, Value::Object(_)) => {
                let primitive = self.to_primitive(right, Hint::Default)?;
                return self.loose_equals(left, &primitive);
            }
            _ => left.strict_equals(right),
        })
    }

    fn compare(&mut self, left: &Value, right: &Value) -> Result<Option<Ordering>, Interrupt> {
        let left = self.to_primitive(left, Hint::Number)?;
        let right = self.to_primitive(right, Hint::Number)?;
        if let (Value::String(left), Value::String(right)) = (&left, &right) {
            return Ok(Some(left.encode_utf16().cmp(right.encode_utf16())));
        }
        let left = self.to_number(&left)?;
        let right = self.to_number(&right)?;
        Ok(left.partial_cmp(&right))
    }

    pub fn binary(&mut self, operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, Interrupt> {
        use BinaryOperator::*;
        Ok(match operator {
            Add => {
                let left = self.to_primitive(left, Hint::Default)?;
                let right = self.to_primitive(right, Hint::Default)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut text = self.to_string(&left)?.to_string();
                    text.push_str(&self.to_string(&right)?);
                    Value::from(text)
                } else {
                    Value::Number(self.to_number(&left)? + self.to_number(&right)?)
                }
            }
            Subtract => Value::Number(self.to_number(left)? - self.to_number(right)?),
            Multiply => Value::Number(self.to_number(left)? * self.to_number(right)?),
            Divide => Value::Number(self.to_number(left)? / self.to_number(right)?),
            Remainder => Value::Number(self.to_number(left)? % self.to_number(right)?),
            Exponent => {
                let base = self.to_number(left)?;
                let exponent = self.to_number(right)?;
                if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
                    Value::Number(f64::NAN)
                } else {
                    Value::Number(base.powf(exponent))
                }
            }
            Equal => Value::Boolean(self.loose_equals(left, right)?),
            NotEqual => Value::Boolean(!self.loose_equals(left, right)?),
            StrictEqual => Value::Boolean(left.strict_equals(right)),
            StrictNotEqual => Value::Boolean(!left.strict_equals(right)),
            Less => Value::Boolean(self.compare(left, right)? == Some(Ordering::Less)),
            Greater => Value::Boolean(self.compare(left, right)? == Some(Ordering::Greater)),
            LessOrEqual => Value::Boolean(matches!(
                self.compare(left, right)?,
                Some(Ordering::Less | Ordering::Equal)
            )),
            GreaterOrEqual => Value::Boolean(matches!(
                self.compare(left, right)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BitwiseAnd => Value::Number(f64::from(self.to_int32(left)? & self.to_int32(right)?)),
            BitwiseOr => Value::Number(f64::from(self.to_int32(left)? | self.to_int32(right)?)),
            BitwiseXor => Value::Number(f64::from(self.to_int32(left)? ^ self.to_int32(right)?)),
            In => {
                let Value::Object(object) = right else {
                    let key = self.to_string(left)?;
                    let found = self.describe(right);
                    return Err(self.throw(
                        ErrorKind::Type,
                        format!("Cannot use 'in' operator to search for '{key}' in {found}"),
                    ));
                };
                let key = self.to_property_key(left)?;
                Value::Boolean(has_property(object, &key))
            }
            Instanceof => Value::Boolean(self.instance_of(left, right)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("0x").is_nan());
    }
}
