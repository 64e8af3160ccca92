//! `Map`, `Set`, `WeakMap` and `WeakSet`.

use super::{Builder, callback};
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{Function, NativeCall, NativeFn, ObjectKind, ObjectRef, Value, ValueMap, WeakTable};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Collection {
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl Collection {
    fn name(self) -> &'static str {
        match self {
            Self::Map => "Map",
            Self::Set => "Set",
            Self::WeakMap => "WeakMap",
            Self::WeakSet => "WeakSet",
        }
    }

    fn matches(self, kind: &ObjectKind) -> bool {
        matches!(
            (self, kind),
            (Self::Map, ObjectKind::Map(_))
                | (Self::Set, ObjectKind::Set(_))
                | (Self::WeakMap, ObjectKind::WeakMap(_))
                | (Self::WeakSet, ObjectKind::WeakSet(_))
        )
    }
}

fn requires_new(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>) -> Interrupt {
    let name = match &call.callee.borrow().kind {
        ObjectKind::Function(Function::Native(native)) => native.name.to_string(),
        _ => String::new(),
    };
    interpreter.throw(ErrorKind::Type, format!("Constructor {name} requires 'new'"))
}

fn call_collection(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Err(requires_new(interpreter, &call))
}

fn this_collection(
    interpreter: &mut Interpreter<'_>,
    call: &NativeCall<'_>,
    collection: Collection,
    method: &str,
) -> Result<ObjectRef, Interrupt> {
    match &call.this {
        Value::Object(object) if collection.matches(&object.borrow().kind) => Ok(object.clone()),
        other => {
            let found = interpreter.describe(other);
            Err(interpreter.throw(
                ErrorKind::Type,
                format!(
                    "Method {}.prototype.{method} called on incompatible receiver {found}",
                    collection.name()
                ),
            ))
        }
    }
}

fn with_entries<R>(object: &ObjectRef, read: impl FnOnce(&mut ValueMap) -> R) -> R {
    match &mut object.borrow_mut().kind {
        ObjectKind::Map(entries) | ObjectKind::Set(entries) => read(entries),
        _ => read(&mut ValueMap::default()),
    }
}

fn with_table<R>(object: &ObjectRef, read: impl FnOnce(&mut WeakTable) -> R) -> R {
    match &mut object.borrow_mut().kind {
        ObjectKind::WeakMap(table) | ObjectKind::WeakSet(table) => read(table),
        _ => read(&mut WeakTable::default()),
    }
}

fn pairs(object: &ObjectRef) -> Vec<(Value, Value)> {
    with_entries(object, |entries| entries.entries.values().cloned().collect())
}

fn add_entries(
    interpreter: &mut Interpreter<'_>,
    target: &Value,
    iterable: &Value,
    collection: Collection,
) -> Result<(), Interrupt> {
    if iterable.is_nullish() {
        return Ok(());
    }
    let adder = match collection {
        Collection::Map | Collection::WeakMap => "set",
        Collection::Set | Collection::WeakSet => "add",
    };
    let adder = interpreter.get_named(target, adder)?;
    for item in interpreter.iterate(iterable)? {
        let arguments = match collection {
            Collection::Map | Collection::WeakMap => {
                if !matches!(item, Value::Object(_)) {
                    let found = interpreter.describe(&item);
                    return Err(interpreter.throw(
                        ErrorKind::Type,
                        format!("Iterator value {found} is not an entry object"),
                    ));
                }
                vec![interpreter.get_named(&item, "0")?, interpreter.get_named(&item, "1")?]
            }
            Collection::Set | Collection::WeakSet => vec![item],
        };
        interpreter.call(&adder, target.clone(), &arguments)?;
    }
    Ok(())
}

fn construct_with(
    interpreter: &mut Interpreter<'_>,
    call: &NativeCall<'_>,
    collection: Collection,
) -> Result<Value, Interrupt> {
    let Value::Object(this) = &call.this else {
        return Err(requires_new(interpreter, call));
    };
    this.borrow_mut().kind = match collection {
        Collection::Map => ObjectKind::Map(ValueMap::default()),
        Collection::Set => ObjectKind::Set(ValueMap::default()),
        Collection::WeakMap => ObjectKind::WeakMap(WeakTable::default()),
        Collection::WeakSet => ObjectKind::WeakSet(WeakTable::default()),
    };
    add_entries(interpreter, &call.this, &call.argument(0), collection)?;
    Ok(call.this.clone())
}

fn construct_map(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    construct_with(interpreter, &call, Collection::Map)
}

fn construct_set(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    construct_with(interpreter, &call, Collection::Set)
}

fn construct_weak_map(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    construct_with(interpreter, &call, Collection::WeakMap)
}

fn construct_weak_set(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    construct_with(interpreter, &call, Collection::WeakSet)
}

// Map and Set.

fn map_get(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let map = this_collection(interpreter, &call, Collection::Map, "get")?;
    let key = call.argument(0);
    Ok(with_entries(&map, |entries| entries.get(&key).cloned()).unwrap_or_default())
}

fn map_set(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let map = this_collection(interpreter, &call, Collection::Map, "set")?;
    with_entries(&map, |entries| entries.insert(call.argument(0), call.argument(1)));
    Ok(call.this)
}

fn set_add(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let set = this_collection(interpreter, &call, Collection::Set, "add")?;
    let value = call.argument(0);
    with_entries(&set, |entries| {
        if !entries.contains(&value) {
            entries.insert(value, Value::Undefined);
        }
    });
    Ok(call.this)
}

fn has_in(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, collection: Collection) -> Result<Value, Interrupt> {
    let object = this_collection(interpreter, call, collection, "has")?;
    let key = call.argument(0);
    Ok(Value::Boolean(with_entries(&object, |entries| entries.contains(&key))))
}

fn delete_in(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, collection: Collection) -> Result<Value, Interrupt> {
    let object = this_collection(interpreter, call, collection, "delete")?;
    let key = call.argument(0);
    Ok(Value::Boolean(with_entries(&object, |entries| entries.remove(&key))))
}

fn clear_in(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, collection: Collection) -> Result<Value, Interrupt> {
    let object = this_collection(interpreter, call, collection, "clear")?;
    with_entries(&object, |entries| entries.entries.clear());
    Ok(Value::Undefined)
}

fn for_each_in(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, collection: Collection) -> Result<Value, Interrupt> {
    let object = this_collection(interpreter, call, collection, "forEach")?;
    let function = callback(interpreter, call, 0)?;
    for (key, value) in pairs(&object) {
        let value = match collection {
            Collection::Set => key.clone(),
            _ => value,
        };
        interpreter.call(&function, call.argument(1), &[value, key, call.this.clone()])?;
    }
    Ok(Value::Undefined)
}

#[derive(Clone, Copy)]
enum Listing {
    Keys,
    Values,
    Entries,
}

fn list_in(
    interpreter: &mut Interpreter<'_>,
    call: &NativeCall<'_>,
    collection: Collection,
    listing: Listing,
) -> Result<Value, Interrupt> {
    let method = match listing {
        Listing::Keys => "keys",
        Listing::Values => "values",
        Listing::Entries => "entries",
    };
    let object = this_collection(interpreter, call, collection, method)?;
    let items = pairs(&object)
        .into_iter()
        .map(|(key, value)| {
            let value = if collection == Collection::Set { key.clone() } else { value };
            match listing {
                Listing::Keys => key,
                Listing::Values => value,
                Listing::Entries => interpreter.array(vec![key, value]),
            }
        })
        .collect();
    Ok(interpreter.array(items))
}

macro_rules! collection_methods {
    ($($name:ident => $body:ident($collection:ident $(, $listing:ident)?)),* $(,)?) => {
        $(
            fn $name(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
                $body(interpreter, &call, Collection::$collection $(, Listing::$listing)?)
            }
        )*
    };
}

collection_methods! {
    map_has => has_in(Map),
    map_delete => delete_in(Map),
    map_clear => clear_in(Map),
    map_for_each => for_each_in(Map),
    map_keys => list_in(Map, Keys),
    map_values => list_in(Map, Values),
    map_entries => list_in(Map, Entries),
    set_has => has_in(Set),
    set_delete => delete_in(Set),
    set_clear => clear_in(Set),
    set_for_each => for_each_in(Set),
    set_values => list_in(Set, Values),
    set_entries => list_in(Set, Entries),
}

// WeakMap and WeakSet.

fn weak_key(value: &Value) -> Option<&ObjectRef> {
    value.as_object()
}

fn weak_map_get(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let map = this_collection(interpreter, &call, Collection::WeakMap, "get")?;
    let key = call.argument(0);
    Ok(weak_key(&key)
        .and_then(|key| with_table(&map, |table| table.get(key).cloned()))
        .unwrap_or_default())
}

fn weak_map_set(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let map = this_collection(interpreter, &call, Collection::WeakMap, "set")?;
    let key = call.argument(0);
    let Some(key) = weak_key(&key) else {
        return Err(interpreter.throw(ErrorKind::Type, "Invalid value used as weak map key"));
    };
    with_table(&map, |table| table.insert(key, call.argument(1)));
    Ok(call.this)
}

fn weak_set_add(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let set = this_collection(interpreter, &call, Collection::WeakSet, "add")?;
    let value = call.argument(0);
    let Some(value) = weak_key(&value) else {
        return Err(interpreter.throw(ErrorKind::Type, "Invalid value used in weak set"));
    };
    with_table(&set, |table| table.insert(value, Value::Undefined));
    Ok(call.this)
}

fn weak_has(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, collection: Collection) -> Result<Value, Interrupt> {
    let object = this_collection(interpreter, call, collection, "has")?;
    let key = call.argument(0);
    Ok(Value::Boolean(
        weak_key(&key).is_some_and(|key| with_table(&object, |table| table.contains(key))),
    ))
}

fn weak_delete(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, collection: Collection) -> Result<Value, Interrupt> {
    let object = this_collection(interpreter, call, collection, "delete")?;
    let key = call.argument(0);
    Ok(Value::Boolean(
        weak_key(&key).is_some_and(|key| with_table(&object, |table| table.remove(key))),
    ))
}

collection_methods! {
    weak_map_has => weak_has(WeakMap),
    weak_map_delete => weak_delete(WeakMap),
    weak_set_has => weak_has(WeakSet),
    weak_set_delete => weak_delete(WeakSet),
}

fn install_collection(
    builder: &mut Builder<'_>,
    name: &'static str,
    prototype: &ObjectRef,
    construct: NativeFn,
    methods: &[(&str, NativeFn)],
) {
    for (method, call) in methods {
        builder.method(prototype, method, *call);
    }
    let constructor = builder.constructor(name, prototype, call_collection, Some(construct));
    builder.global(name, constructor);
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().map_prototype.clone();
    install_collection(
        builder,
        "Map",
        &prototype,
        construct_map,
        &[
            ("get", map_get),
            ("set", map_set),
            ("has", map_has),
            ("delete", map_delete),
            ("clear", map_clear),
            ("forEach", map_for_each),
            ("keys", map_keys),
            ("values", map_values),
            ("entries", map_entries),
        ],
    );
    let prototype = builder.realm().set_prototype.clone();
    install_collection(
        builder,
        "Set",
        &prototype,
        construct_set,
        &[
            ("add", set_add),
            ("has", set_has),
            ("delete", set_delete),
            ("clear", set_clear),
            ("forEach", set_for_each),
            ("keys", set_values),
            ("values", set_values),
            ("entries", set_entries),
        ],
    );
    let prototype = builder.realm().weak_map_prototype.clone();
    install_collection(
        builder,
        "WeakMap",
        &prototype,
        construct_weak_map,
        &[
            ("get", weak_map_get),
            ("set", weak_map_set),
            ("has", weak_map_has),
            ("delete", weak_map_delete),
        ],
    );
    let prototype = builder.realm().weak_set_prototype.clone();
    install_collection(
        builder,
        "WeakSet",
        &prototype,
        construct_weak_set,
        &[
            ("add", weak_set_add),
            ("has", weak_set_has),
            ("delete", weak_set_delete),
        ],
    );
}
