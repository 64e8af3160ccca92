use super::{Builder, callback, integer_argument, relative_index};
use crate::sandbox::interpreter::{Interpreter, Interrupt};
use crate::sandbox::operations::MAX_ARRAY_LENGTH;
use crate::sandbox::realm::ErrorKind;
use crate::sandbox::value::{NativeCall, NativeFn, ObjectKind, ObjectRef, Value};
use std::cmp::Ordering;

fn items_from_arguments(interpreter: &mut Interpreter<'_>, arguments: &[Value]) -> Result<Vec<Value>, Interrupt> {
    match arguments {
        [Value::Number(length)] => {
            let length = interpreter.array_length(*length)?;
            Ok(vec![Value::Undefined; length])
        }
        _ => Ok(arguments.to_vec()),
    }
}

fn call_array(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let items = items_from_arguments(interpreter, call.arguments)?;
    Ok(interpreter.array(items))
}

fn construct_array(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let items = items_from_arguments(interpreter, call.arguments)?;
    if let Value::Object(this) = &call.this {
        this.borrow_mut().kind = ObjectKind::Array(items);
    }
    Ok(call.this)
}

fn is_array(_: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(is_array_value(&call.argument(0))))
}

fn is_array_value(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| matches!(object.borrow().kind, ObjectKind::Array(_)))
}

fn from(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let source = call.argument(0);
    let iterable = match &source {
        Value::String(_) => true,
        Value::Object(object) => matches!(
            object.borrow().kind,
            ObjectKind::Array(_) | ObjectKind::Map(_) | ObjectKind::Set(_)
        ),
        _ => false,
    };
    let items = if iterable {
        interpreter.iterate(&source)?
    } else if let Value::Object(_) = &source {
        // Array-like: `{ length: 3 }`.
        let length = interpreter.get_named(&source, "length")?;
        let length = interpreter.to_integer(&length)?.max(0.0);
        let length = interpreter.array_length(length)?;
        let mut items = Vec::with_capacity(length);
        for index in 0..length {
            items.push(interpreter.get(&source, &index.into())?);
        }
        items
    } else if source.is_nullish() {
        interpreter.iterate(&source)?
    } else {
        Vec::new()
    };
    let mapper = call.argument(1);
    if mapper.is_nullish() {
        return Ok(interpreter.array(items));
    }
    let mapper = callback(interpreter, &call, 1)?;
    let mut mapped = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        mapped.push(interpreter.call(&mapper, call.argument(2), &[item, Value::from(index)])?);
    }
    Ok(interpreter.array(mapped))
}

fn of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(interpreter.array(call.arguments.to_vec()))
}

// Prototype helpers.

fn this_array(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str) -> Result<ObjectRef, Interrupt> {
    match &call.this {
        Value::Object(object) if matches!(object.borrow().kind, ObjectKind::Array(_)) => Ok(object.clone()),
        _ => Err(interpreter.throw(
            ErrorKind::Type,
            format!("Array.prototype.{method} called on a value that is not an array"),
        )),
    }
}

fn snapshot(array: &ObjectRef) -> Vec<Value> {
    match &array.borrow().kind {
        ObjectKind::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn length(array: &ObjectRef) -> usize {
    match &array.borrow().kind {
        ObjectKind::Array(items) => items.len(),
        _ => 0,
    }
}

fn element(array: &ObjectRef, index: usize) -> Option<Value> {
    match &array.borrow().kind {
        ObjectKind::Array(items) => items.get(index).cloned(),
        _ => None,
    }
}

/// Mutates the items of a non-frozen array.
fn modify<R>(
    interpreter: &mut Interpreter<'_>,
    array: &ObjectRef,
    change: impl FnOnce(&mut Vec<Value>) -> R,
) -> Result<R, Interrupt> {
    if array.borrow().frozen {
        let index = length(array);
        return Err(interpreter.throw(
            ErrorKind::Type,
            format!("Cannot add property {index}, object is not extensible"),
        ));
    }
    let mut array = array.borrow_mut();
    match &mut array.kind {
        ObjectKind::Array(items) => Ok(change(items)),
        _ => Ok(change(&mut Vec::new())),
    }
}

fn grow(interpreter: &mut Interpreter<'_>, current: usize, added: usize) -> Result<(), Interrupt> {
    if current + added >= MAX_ARRAY_LENGTH {
        return Err(interpreter.throw(ErrorKind::Range, "Invalid array length"));
    }
    Ok(())
}

fn push(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "push")?;
    grow(interpreter, length(&array), call.arguments.len())?;
    modify(interpreter, &array, |items| {
        items.extend_from_slice(call.arguments);
        Value::from(items.len())
    })
}

fn pop(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "pop")?;
    modify(interpreter, &array, |items| items.pop().unwrap_or_default())
}

fn shift(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "shift")?;
    modify(interpreter, &array, |items| {
        if items.is_empty() {
            Value::Undefined
        } else {
            items.remove(0)
        }
    })
}

fn unshift(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "unshift")?;
    grow(interpreter, length(&array), call.arguments.len())?;
    modify(interpreter, &array, |items| {
        items.splice(0..0, call.arguments.iter().cloned());
        Value::from(items.len())
    })
}

fn slice(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "slice")?;
    let items = snapshot(&array);
    let start = relative_index(integer_argument(interpreter, &call, 0, 0.0)?, items.len());
    let end = relative_index(integer_argument(interpreter, &call, 1, items.len() as f64)?, items.len());
    let sliced = items.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default();
    Ok(interpreter.array(sliced))
}

fn splice(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "splice")?;
    let current = length(&array);
    let start = relative_index(integer_argument(interpreter, &call, 0, 0.0)?, current);
    let delete_count = match call.arguments.len() {
        0 => 0,
        1 => current - start,
        _ => {
            let count = interpreter.to_integer(&call.argument(1))?;
            count.clamp(0.0, (current - start) as f64) as usize
        }
    };
    let inserted = call.arguments.get(2..).unwrap_or_default();
    if inserted.len() > delete_count {
        grow(interpreter, current, inserted.len() - delete_count)?;
    }
    let removed = modify(interpreter, &array, |items| {
        items
            .splice(start..start + delete_count, inserted.iter().cloned())
            .collect::<Vec<_>>()
    })?;
    Ok(interpreter.array(removed))
}

fn concat(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "concat")?;
    let mut items = snapshot(&array);
    for argument in call.arguments {
        match argument {
            Value::Object(object) if is_array_value(argument) => items.extend(snapshot(object)),
            other => items.push(other.clone()),
        }
        grow(interpreter, items.len(), 0)?;
    }
    Ok(interpreter.array(items))
}

fn join_items(interpreter: &mut Interpreter<'_>, items: &[Value], separator: &str) -> Result<String, Interrupt> {
    let mut joined = String::new();
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            joined.push_str(separator);
        }
        if !item.is_nullish() {
            joined.push_str(&interpreter.to_string(item)?);
        }
    }
    Ok(joined)
}

fn join(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "join")?;
    let separator = match call.argument(0) {
        Value::Undefined => ",".into(),
        separator => interpreter.to_string(&separator)?,
    };
    let items = snapshot(&array);
    Ok(Value::from(join_items(interpreter, &items, &separator)?))
}

fn to_string(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "toString")?;
    let items = snapshot(&array);
    Ok(Value::from(join_items(interpreter, &items, ",")?))
}

fn reverse(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "reverse")?;
    modify(interpreter, &array, |items| items.reverse())?;
    Ok(call.this)
}

fn index_of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "indexOf")?;
    let items = snapshot(&array);
    let start = relative_index(integer_argument(interpreter, &call, 1, 0.0)?, items.len());
    let target = call.argument(0);
    let found = items
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, item)| item.strict_equals(&target))
        .map_or(-1.0, |(index, _)| index as f64);
    Ok(Value::Number(found))
}

fn last_index_of(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "lastIndexOf")?;
    let items = snapshot(&array);
    if items.is_empty() {
        return Ok(Value::Number(-1.0));
    }
    let last = items.len() as f64 - 1.0;
    let position = integer_argument(interpreter, &call, 1, last)?;
    let position = if position < 0.0 { last + 1.0 + position } else { position.min(last) };
    if position < 0.0 {
        return Ok(Value::Number(-1.0));
    }
    let target = call.argument(0);
    let found = items[..=position as usize]
        .iter()
        .rposition(|item| item.strict_equals(&target))
        .map_or(-1.0, |index| index as f64);
    Ok(Value::Number(found))
}

fn includes(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "includes")?;
    let items = snapshot(&array);
    let start = relative_index(integer_argument(interpreter, &call, 1, 0.0)?, items.len());
    let target = call.argument(0);
    Ok(Value::Boolean(items.iter().skip(start).any(|item| item.same_value_zero(&target))))
}

fn at(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "at")?;
    let position = integer_argument(interpreter, &call, 0, 0.0)?;
    let current = length(&array) as f64;
    let index = if position < 0.0 { current + position } else { position };
    if index < 0.0 || index >= current {
        return Ok(Value::Undefined);
    }
    Ok(element(&array, index as usize).unwrap_or_default())
}

fn fill(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "fill")?;
    let current = length(&array);
    let start = relative_index(integer_argument(interpreter, &call, 1, 0.0)?, current);
    let end = relative_index(integer_argument(interpreter, &call, 2, current as f64)?, current);
    let value = call.argument(0);
    modify(interpreter, &array, |items| {
        for item in items.iter_mut().take(end).skip(start) {
            *item = value.clone();
        }
    })?;
    Ok(call.this)
}

/// Calls `callback(item, index, array)` for every index present when the walk started.
fn walk(
    interpreter: &mut Interpreter<'_>,
    call: &NativeCall<'_>,
    method: &str,
    reverse: bool,
    mut visit: impl FnMut(&mut Interpreter<'_>, usize, Value, Value) -> Result<bool, Interrupt>,
) -> Result<(), Interrupt> {
    let array = this_array(interpreter, call, method)?;
    let function = callback(interpreter, call, 0)?;
    let count = length(&array);
    let order: Box<dyn Iterator<Item = usize>> = if reverse {
        Box::new((0..count).rev())
    } else {
        Box::new(0..count)
    };
    for index in order {
        let Some(item) = element(&array, index) else {
            continue;
        };
        let result = interpreter.call(
            &function,
            call.argument(1),
            &[item.clone(), Value::from(index), Value::Object(array.clone())],
        )?;
        if !visit(interpreter, index, item, result)? {
            break;
        }
    }
    Ok(())
}

fn for_each(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    walk(interpreter, &call, "forEach", false, |_, _, _, _| Ok(true))?;
    Ok(Value::Undefined)
}

fn map(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let mut mapped = Vec::new();
    walk(interpreter, &call, "map", false, |_, _, _, result| {
        mapped.push(result);
        Ok(true)
    })?;
    Ok(interpreter.array(mapped))
}

fn filter(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let mut kept = Vec::new();
    walk(interpreter, &call, "filter", false, |_, _, item, result| {
        if result.is_truthy() {
            kept.push(item);
        }
        Ok(true)
    })?;
    Ok(interpreter.array(kept))
}

fn find_with(
    interpreter: &mut Interpreter<'_>,
    call: &NativeCall<'_>,
    method: &str,
    reverse: bool,
) -> Result<Option<(usize, Value)>, Interrupt> {
    let mut found = None;
    walk(interpreter, call, method, reverse, |_, index, item, result| {
        if result.is_truthy() {
            found = Some((index, item));
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

fn find(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(find_with(interpreter, &call, "find", false)?
        .map(|(_, item)| item)
        .unwrap_or_default())
}

fn find_index(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let found = find_with(interpreter, &call, "findIndex", false)?;
    Ok(Value::Number(found.map_or(-1.0, |(index, _)| index as f64)))
}

fn find_last(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(find_with(interpreter, &call, "findLast", true)?
        .map(|(_, item)| item)
        .unwrap_or_default())
}

fn find_last_index(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let found = find_with(interpreter, &call, "findLastIndex", true)?;
    Ok(Value::Number(found.map_or(-1.0, |(index, _)| index as f64)))
}

fn some(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    Ok(Value::Boolean(find_with(interpreter, &call, "some", false)?.is_some()))
}

fn every(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let mut all = true;
    walk(interpreter, &call, "every", false, |_, _, _, result| {
        all = result.is_truthy();
        Ok(all)
    })?;
    Ok(Value::Boolean(all))
}

fn reduce_with(interpreter: &mut Interpreter<'_>, call: &NativeCall<'_>, method: &str, reverse: bool) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, call, method)?;
    let function = callback(interpreter, call, 0)?;
    let count = length(&array);
    let mut indices: Vec<usize> = (0..count).collect();
    if reverse {
        indices.reverse();
    }
    let mut indices = indices.into_iter();
    let mut accumulator = if call.arguments.len() >= 2 {
        call.argument(1)
    } else {
        match indices.next() {
            Some(first) => element(&array, first).unwrap_or_default(),
            None => {
                return Err(interpreter.throw(ErrorKind::Type, "Reduce of empty array with no initial value"));
            }
        }
    };
    for index in indices {
        let Some(item) = element(&array, index) else {
            continue;
        };
        accumulator = interpreter.call(
            &function,
            Value::Undefined,
            &[accumulator, item, Value::from(index), Value::Object(array.clone())],
        )?;
    }
    Ok(accumulator)
}

fn reduce(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    reduce_with(interpreter, &call, "reduce", false)
}

fn reduce_right(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    reduce_with(interpreter, &call, "reduceRight", true)
}

fn compare_items(interpreter: &mut Interpreter<'_>, comparator: &Value, left: &Value, right: &Value) -> Result<Ordering, Interrupt> {
    if comparator.is_nullish() {
        let left = interpreter.to_string(left)?;
        let right = interpreter.to_string(right)?;
        return Ok(left.encode_utf16().cmp(right.encode_utf16()));
    }
    let result = interpreter.call(comparator, Value::Undefined, &[left.clone(), right.clone()])?;
    let result = interpreter.to_number(&result)?;
    Ok(if result < 0.0 {
        Ordering::Less
    } else if result > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    })
}

/// Stable merge sort that stops at the first error a comparator raises.
fn merge_sort(interpreter: &mut Interpreter<'_>, mut items: Vec<Value>, comparator: &Value) -> Result<Vec<Value>, Interrupt> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interpreter, items, comparator)?;
    let right = merge_sort(interpreter, right, comparator)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(first), Some(second)) = (left.peek(), right.peek()) {
        if compare_items(interpreter, comparator, second, first)? == Ordering::Less {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn sort(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "sort")?;
    let comparator = call.argument(0);
    if !comparator.is_nullish() {
        callback(interpreter, &call, 0)?;
    }
    let (defined, undefined): (Vec<Value>, Vec<Value>) = snapshot(&array)
        .into_iter()
        .partition(|item| !matches!(item, Value::Undefined));
    let mut sorted = merge_sort(interpreter, defined, &comparator)?;
    sorted.extend(undefined);
    modify(interpreter, &array, |items| *items = sorted)?;
    Ok(call.this)
}

fn flatten(items: Vec<Value>, depth: f64, into: &mut Vec<Value>) {
    for item in items {
        match &item {
            Value::Object(object) if depth >= 1.0 && is_array_value(&item) => {
                flatten(snapshot(object), depth - 1.0, into);
            }
            _ => into.push(item),
        }
    }
}

fn flat(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "flat")?;
    let depth = integer_argument(interpreter, &call, 0, 1.0)?;
    let mut flattened = Vec::new();
    flatten(snapshot(&array), depth, &mut flattened);
    grow(interpreter, flattened.len(), 0)?;
    Ok(interpreter.array(flattened))
}

fn flat_map(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let mut mapped = Vec::new();
    walk(interpreter, &call, "flatMap", false, |_, _, _, result| {
        mapped.push(result);
        Ok(true)
    })?;
    let mut flattened = Vec::new();
    flatten(mapped, 1.0, &mut flattened);
    Ok(interpreter.array(flattened))
}

fn keys(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "keys")?;
    let keys = (0..length(&array)).map(Value::from).collect();
    Ok(interpreter.array(keys))
}

fn values(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "values")?;
    let items = snapshot(&array);
    Ok(interpreter.array(items))
}

fn entries(interpreter: &mut Interpreter<'_>, call: NativeCall<'_>) -> Result<Value, Interrupt> {
    let array = this_array(interpreter, &call, "entries")?;
    let entries = snapshot(&array)
        .into_iter()
        .enumerate()
        .map(|(index, item)| interpreter.array(vec![Value::from(index), item]))
        .collect();
    Ok(interpreter.array(entries))
}

pub fn install(builder: &mut Builder<'_>) {
    let prototype = builder.realm().array_prototype.clone();
    let methods: [(&str, NativeFn); 32] = [
        ("push", push),
        ("pop", pop),
        ("shift", shift),
        ("unshift", unshift),
        ("slice", slice),
        ("splice", splice),
        ("concat", concat),
        ("join", join),
        ("toString", to_string),
        ("reverse", reverse),
        ("indexOf", index_of),
        ("lastIndexOf", last_index_of),
        ("includes", includes),
        ("at", at),
        ("fill", fill),
        ("forEach", for_each),
        ("map", map),
        ("filter", filter),
        ("find", find),
        ("findIndex", find_index),
        ("findLast", find_last),
        ("findLastIndex", find_last_index),
        ("some", some),
        ("every", every),
        ("reduce", reduce),
        ("reduceRight", reduce_right),
        ("sort", sort),
        ("flat", flat),
        ("flatMap", flat_map),
        ("keys", keys),
        ("values", values),
        ("entries", entries),
    ];
    for (name, call) in methods {
        builder.method(&prototype, name, call);
    }
    let array = builder.constructor("Array", &prototype, call_array, Some(construct_array));
    builder.method(&array, "isArray", is_array);
    builder.method(&array, "from", from);
    builder.method(&array, "of", of);
    builder.global("Array", array);
}
