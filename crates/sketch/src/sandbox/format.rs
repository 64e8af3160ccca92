//! Snapshots of script values taken when they leave the interpreter.

use super::builtins::stringify;
use super::interpreter::Interpreter;
use super::value::{Function, ObjectKind, ObjectRef, Value};
use crate::output::CapturedValue;

impl Interpreter<'_> {
    /// Objects become JSON text, or their `String()` form when JSON fails.
    pub fn capture(&mut self, value: &Value) -> CapturedValue {
        match value {
            Value::Undefined => CapturedValue::Undefined,
            Value::Null => CapturedValue::Null,
            Value::Boolean(boolean) => CapturedValue::Boolean(*boolean),
            Value::Number(number) => CapturedValue::Number(*number),
            Value::String(text) => CapturedValue::String(text.to_string()),
            Value::Symbol(symbol) => CapturedValue::Symbol(symbol.to_string()),
            Value::Object(object) if value.is_callable() => CapturedValue::Function(self.function_source(object)),
            Value::Object(_) => {
                if let Ok(Some(json)) = stringify(self, value, &Value::Undefined, &Value::Undefined) {
                    return CapturedValue::Object(json);
                }
                let text = self
                    .to_string(value)
                    .map(|text| text.to_string())
                    .unwrap_or_else(|_| "[object Object]".to_string());
                CapturedValue::Object(text)
            }
        }
    }

    /// What `Function.prototype.toString` returns.
    pub fn function_source(&self, function: &ObjectRef) -> String {
        match &function.borrow().kind {
            ObjectKind::Function(Function::Closure(closure)) => self.source_text(closure.function.span).to_string(),
            ObjectKind::Function(Function::Class(class)) => self.source_text(class.class.span).to_string(),
            ObjectKind::Function(Function::Native(native)) => {
                format!("function {}() {{ [native code] }}", native.name)
            }
            _ => "function () { [native code] }".to_string(),
        }
    }
}
