//! Runtime values of the interpreter.

use super::interpreter::{Interpreter, Interrupt};
use super::scope::ScopeRef;
use crate::parser::{self, number_to_string};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

pub type ObjectRef = Rc<RefCell<Object>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Rc<Symbol>),
    Object(ObjectRef),
}

impl Value {
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Self::String(text.into())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.as_object()
            .is_some_and(|object| matches!(object.borrow().kind, ObjectKind::Function(_)))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Object(_) if self.is_callable() => "function",
            Self::Object(_) => "object",
        }
    }

    /// ToBoolean.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(boolean) => *boolean,
            Self::Number(number) => *number != 0.0 && !number.is_nan(),
            Self::String(string) => !string.is_empty(),
            Self::Symbol(_) | Self::Object(_) => true,
        }
    }

    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Boolean(left), Self::Boolean(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Symbol(left), Self::Symbol(right)) => Rc::ptr_eq(left, right),
            (Self::Object(left), Self::Object(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }

    /// SameValueZero, used by `includes`, `Map` and `Set`.
    pub fn same_value_zero(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) if left.is_nan() && right.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl From<bool> for Value {
    fn from(boolean: bool) -> Self {
        Self::Boolean(boolean)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

impl From<usize> for Value {
    fn from(number: usize) -> Self {
        Self::Number(number as f64)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::String(Rc::from(text))
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::String(Rc::from(text))
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

// Shallow: objects may be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Boolean(boolean) => write!(f, "{boolean}"),
            Self::Number(number) => f.write_str(&number_to_string(*number)),
            Self::String(string) => write!(f, "{string:?}"),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
            Self::Object(object) => match object.try_borrow() {
                Ok(object) => write!(f, "[object {}]", object.kind.class_name()),
                Err(_) => f.write_str("[object]"),
            },
        }
    }
}

pub struct Symbol {
    pub description: Option<Rc<str>>,
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description.as_deref().unwrap_or_default())
    }
}

#[derive(Clone)]
pub enum PropertyKey {
    String(Rc<str>),
    Symbol(Rc<Symbol>),
}

impl PropertyKey {
    /// Canonical array index (`"0"`, `"17"`, never `"01"`).
    pub fn array_index(&self) -> Option<usize> {
        let Self::String(key) = self else {
            return None;
        };
        if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
            return None;
        }
        if !key.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        key.parse().ok()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(key) => Some(key),
            Self::Symbol(_) => None,
        }
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Symbol(left), Self::Symbol(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl Eq for PropertyKey {}

impl Hash for PropertyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::String(key) => {
                0u8.hash(state);
                key.hash(state);
            }
            Self::Symbol(symbol) => {
                1u8.hash(state);
                Rc::as_ptr(symbol).hash(state);
            }
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(key: &str) -> Self {
        Self::String(Rc::from(key))
    }
}

impl From<String> for PropertyKey {
    fn from(key: String) -> Self {
        Self::String(Rc::from(key))
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        Self::String(Rc::from(index.to_string()))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(key) => f.write_str(key),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

#[derive(Clone)]
pub struct Property {
    pub value: Value,
    pub enumerable: bool,
    /// Set for `get`/`set` members; `value` is then unused.
    pub accessor: Option<Accessor>,
}

impl Property {
    pub fn new(value: Value, enumerable: bool) -> Self {
        Self {
            value,
            enumerable,
            accessor: None,
        }
    }

    pub fn enumerable(value: Value) -> Self {
        Self::new(value, true)
    }

    pub fn hidden(value: Value) -> Self {
        Self::new(value, false)
    }

    pub fn accessor(accessor: Accessor, enumerable: bool) -> Self {
        Self {
            value: Value::Undefined,
            enumerable,
            accessor: Some(accessor),
        }
    }
}

#[derive(Clone, Default)]
pub struct Accessor {
    pub get: Option<Value>,
    pub set: Option<Value>,
}

pub struct Object {
    pub prototype: Option<ObjectRef>,
    pub properties: IndexMap<PropertyKey, Property>,
    pub kind: ObjectKind,
    pub frozen: bool,
}

impl Object {
    pub fn new(prototype: Option<ObjectRef>, kind: ObjectKind) -> Self {
        Self {
            prototype,
            properties: IndexMap::new(),
            kind,
            frozen: false,
        }
    }

    pub fn function(&self) -> Option<&Function> {
        match &self.kind {
            ObjectKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn define(&mut self, key: impl Into<PropertyKey>, property: Property) {
        self.properties.insert(key.into(), property);
    }

    /// Properties backed by the object's kind rather than its property table.
    pub fn exotic(&self, key: &PropertyKey) -> Option<Value> {
        match &self.kind {
            ObjectKind::Array(items) => match key.array_index() {
                Some(index) => items.get(index).cloned(),
                None if key.as_str() == Some("length") => Some(Value::from(items.len())),
                None => None,
            },
            ObjectKind::Map(entries) | ObjectKind::Set(entries) if key.as_str() == Some("size") => {
                Some(Value::from(entries.len()))
            }
            _ => None,
        }
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.exotic(key).is_some() || self.properties.contains_key(key)
    }

    /// Own enumerable string keys: integer keys ascending, then insertion order.
    pub fn enumerable_keys(&self) -> Vec<PropertyKey> {
        let mut keys = match &self.kind {
            ObjectKind::Array(items) => (0..items.len()).map(PropertyKey::from).collect(),
            _ => Vec::new(),
        };
        let mut indices = Vec::new();
        for (key, property) in &self.properties {
            if !property.enumerable || matches!(key, PropertyKey::Symbol(_)) {
                continue;
            }
            match key.array_index() {
                Some(index) => indices.push((index, key.clone())),
                None => keys.push(key.clone()),
            }
        }
        if !indices.is_empty() {
            indices.sort_by_key(|(index, _)| *index);
            let named = std::mem::take(&mut keys);
            keys = indices.into_iter().map(|(_, key)| key).collect();
            keys.extend(named);
        }
        keys
    }
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Function),
    Error,
    /// Milliseconds since the epoch, NaN for an invalid date.
    Date(f64),
    RegExp(Rc<RegExpData>),
    Map(ValueMap),
    Set(ValueMap),
    WeakMap(WeakTable),
    WeakSet(WeakTable),
    Promise(PromiseState),
}

impl ObjectKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Ordinary => "Object",
            Self::Array(_) => "Array",
            Self::Function(_) => "Function",
            Self::Error => "Error",
            Self::Date(_) => "Date",
            Self::RegExp(_) => "RegExp",
            Self::Map(_) => "Map",
            Self::Set(_) => "Set",
            Self::WeakMap(_) => "WeakMap",
            Self::WeakSet(_) => "WeakSet",
            Self::Promise(_) => "Promise",
        }
    }
}

pub struct RegExpData {
    pub source: String,
    pub flags: String,
    pub regex: regex::Regex,
}

impl RegExpData {
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }
}

pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

pub type NativeFn = fn(&mut Interpreter<'_>, NativeCall<'_>) -> Result<Value, Interrupt>;

pub struct NativeCall<'call> {
    pub this: Value,
    pub arguments: &'call [Value],
    pub callee: &'call ObjectRef,
}

impl NativeCall<'_> {
    pub fn argument(&self, index: usize) -> Value {
        self.arguments.get(index).cloned().unwrap_or_default()
    }

    /// Extra value stored on the native function when it was created.
    pub fn slot(&self, index: usize) -> Value {
        match &self.callee.borrow().kind {
            ObjectKind::Function(Function::Native(native)) => native.slots.get(index).cloned().unwrap_or_default(),
            _ => Value::Undefined,
        }
    }
}

pub enum Function {
    Closure(Closure),
    Native(NativeFunction),
    Bound(BoundFunction),
    Class(ClassFunction),
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ClosureKind {
    Normal,
    Arrow,
    Method,
}

#[derive(Clone)]
pub struct Closure {
    pub function: Rc<parser::Function>,
    pub scope: ScopeRef,
    pub kind: ClosureKind,
    /// Object whose prototype `super.x` reads from.
    pub home_object: Option<ObjectRef>,
}

pub struct NativeFunction {
    pub name: Rc<str>,
    pub call: NativeFn,
    pub construct: Option<NativeFn>,
    pub slots: Vec<Value>,
}

#[derive(Clone)]
pub struct BoundFunction {
    pub target: ObjectRef,
    pub this: Value,
    pub arguments: Vec<Value>,
}

#[derive(Clone)]
pub struct ClassFunction {
    pub class: Rc<parser::Class>,
    pub scope: ScopeRef,
    pub parent: Option<ObjectRef>,
    pub prototype: ObjectRef,
}

/// Key under SameValueZero: NaN equals NaN and `-0` equals `0`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Undefined,
    Null,
    Boolean(bool),
    Number(u64),
    String(Rc<str>),
    Identity(usize),
}

impl MapKey {
    pub fn new(value: &Value) -> Self {
        match value {
            Value::Undefined => Self::Undefined,
            Value::Null => Self::Null,
            Value::Boolean(boolean) => Self::Boolean(*boolean),
            Value::Number(number) if number.is_nan() => Self::Number(f64::NAN.to_bits()),
            Value::Number(number) if *number == 0.0 => Self::Number(0f64.to_bits()),
            Value::Number(number) => Self::Number(number.to_bits()),
            Value::String(string) => Self::String(string.clone()),
            Value::Symbol(symbol) => Self::Identity(Rc::as_ptr(symbol) as *const () as usize),
            Value::Object(object) => Self::Identity(Rc::as_ptr(object) as *const () as usize),
        }
    }
}

/// Insertion-ordered entries of a `Map` (or a `Set`, with `Undefined` values).
#[derive(Default)]
pub struct ValueMap {
    pub entries: IndexMap<MapKey, (Value, Value)>,
}

impl ValueMap {
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(&MapKey::new(key)).map(|(_, value)| value)
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        let key = match key {
            Value::Number(number) if number == 0.0 => Value::Number(0.0),
            key => key,
        };
        self.entries.insert(MapKey::new(&key), (key, value));
    }

    pub fn remove(&mut self, key: &Value) -> bool {
        self.entries.shift_remove(&MapKey::new(key)).is_some()
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.entries.contains_key(&MapKey::new(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entries keyed by object identity that do not keep their key alive.
#[derive(Default)]
pub struct WeakTable {
    entries: IndexMap<usize, (Weak<RefCell<Object>>, Value)>,
}

impl WeakTable {
    fn slot(key: &ObjectRef) -> usize {
        Rc::as_ptr(key) as *const () as usize
    }

    pub fn get(&self, key: &ObjectRef) -> Option<&Value> {
        self.entries
            .get(&Self::slot(key))
            .filter(|(weak, _)| weak.upgrade().is_some_and(|live| Rc::ptr_eq(&live, key)))
            .map(|(_, value)| value)
    }

    pub fn insert(&mut self, key: &ObjectRef, value: Value) {
        self.entries.insert(Self::slot(key), (Rc::downgrade(key), value));
    }

    pub fn remove(&mut self, key: &ObjectRef) -> bool {
        let present = self.get(key).is_some();
        self.entries.shift_remove(&Self::slot(key));
        present
    }

    pub fn contains(&self, key: &ObjectRef) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_index_keys_are_canonical() {
        assert_eq!(PropertyKey::from("0").array_index(), Some(0));
        assert_eq!(PropertyKey::from("42").array_index(), Some(42));
        assert_eq!(PropertyKey::from("01").array_index(), None);
        assert_eq!(PropertyKey::from("-1").array_index(), None);
        assert_eq!(PropertyKey::from("length").array_index(), None);
    }

    #[test]
    fn map_keys_use_same_value_zero() {
        let mut map = ValueMap::default();
        map.insert(Value::Number(f64::NAN), Value::from("nan"));
        map.insert(Value::Number(-0.0), Value::from("zero"));
        assert!(map.contains(&Value::Number(f64::NAN)));
        assert!(map.contains(&Value::Number(0.0)));
        map.insert(Value::from("1"), Value::Null);
        assert!(!map.contains(&Value::Number(1.0)));
        assert_eq!(map.len(), 3);
        assert!(map.remove(&Value::Number(0.0)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(!Value::Null.is_truthy());
    }
}
