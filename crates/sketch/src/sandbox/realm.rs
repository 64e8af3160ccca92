//! Object allocation and the intrinsic prototypes every run starts from.

use super::value::{Function, NativeFn, NativeFunction, Object, ObjectKind, ObjectRef, Property, PropertyKey, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Every object a run allocates, so cycles can be broken when it ends.
#[derive(Default)]
pub struct Heap {
    objects: Vec<Weak<RefCell<Object>>>,
}

impl Heap {
    pub fn allocate(&mut self, object: Object) -> ObjectRef {
        let object = Rc::new(RefCell::new(object));
        self.objects.push(Rc::downgrade(&object));
        if self.objects.len().is_power_of_two() {
            self.objects.retain(|weak| weak.strong_count() > 0);
        }
        object
    }

    pub fn live(&self) -> usize {
        self.objects.iter().filter(|weak| weak.strong_count() > 0).count()
    }

    /// Severs all references held by live objects.
    pub fn release(&mut self) {
        for weak in self.objects.drain(..) {
            let Some(object) = weak.upgrade() else {
                continue;
            };
            let Ok(mut object) = object.try_borrow_mut() else {
                continue;
            };
            let properties = std::mem::take(&mut object.properties);
            let kind = std::mem::replace(&mut object.kind, ObjectKind::Ordinary);
            let prototype = object.prototype.take();
            drop(object);
            drop((properties, kind, prototype));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    Type,
    Range,
    Reference,
    Syntax,
    Uri,
}

impl ErrorKind {
    pub const ALL: [Self; 6] = [
        Self::Error,
        Self::Type,
        Self::Range,
        Self::Reference,
        Self::Syntax,
        Self::Uri,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Type => "TypeError",
            Self::Range => "RangeError",
            Self::Reference => "ReferenceError",
            Self::Syntax => "SyntaxError",
            Self::Uri => "URIError",
        }
    }
}

pub struct Realm {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub symbol_prototype: ObjectRef,
    pub date_prototype: ObjectRef,
    pub regexp_prototype: ObjectRef,
    pub map_prototype: ObjectRef,
    pub set_prototype: ObjectRef,
    pub weak_map_prototype: ObjectRef,
    pub weak_set_prototype: ObjectRef,
    pub promise_prototype: ObjectRef,
    error_prototypes: Vec<(ErrorKind, ObjectRef)>,
}

impl Realm {
    /// Empty intrinsic prototypes, linked to `Object.prototype`.
    pub fn new(heap: &mut Heap) -> Self {
        let object_prototype = heap.allocate(Object::new(None, ObjectKind::Ordinary));
        let mut derived = |kind: ObjectKind| heap.allocate(Object::new(Some(object_prototype.clone()), kind));
        let function_prototype = derived(ObjectKind::Ordinary);
        let array_prototype = derived(ObjectKind::Array(Vec::new()));
        let string_prototype = derived(ObjectKind::Ordinary);
        let number_prototype = derived(ObjectKind::Ordinary);
        let boolean_prototype = derived(ObjectKind::Ordinary);
        let symbol_prototype = derived(ObjectKind::Ordinary);
        let date_prototype = derived(ObjectKind::Ordinary);
        let regexp_prototype = derived(ObjectKind::Ordinary);
        let map_prototype = derived(ObjectKind::Ordinary);
        let set_prototype = derived(ObjectKind::Ordinary);
        let weak_map_prototype = derived(ObjectKind::Ordinary);
        let weak_set_prototype = derived(ObjectKind::Ordinary);
        let promise_prototype = derived(ObjectKind::Ordinary);
        let error_prototype = derived(ObjectKind::Ordinary);
        let mut error_prototypes = vec![(ErrorKind::Error, error_prototype.clone())];
        for kind in &ErrorKind::ALL[1..] {
            let prototype = heap.allocate(Object::new(Some(error_prototype.clone()), ObjectKind::Ordinary));
            error_prototypes.push((*kind, prototype));
        }
        Self {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            symbol_prototype,
            date_prototype,
            regexp_prototype,
            map_prototype,
            set_prototype,
            weak_map_prototype,
            weak_set_prototype,
            promise_prototype,
            error_prototypes,
        }
    }

    pub fn error_prototype(&self, kind: ErrorKind) -> &ObjectRef {
        self.error_prototypes
            .iter()
            .find(|(candidate, _)| *candidate == kind)
            .map(|(_, prototype)| prototype)
            .unwrap_or(&self.object_prototype)
    }

    pub fn native_function(
        &self,
        heap: &mut Heap,
        name: &str,
        call: NativeFn,
        construct: Option<NativeFn>,
        slots: Vec<Value>,
    ) -> ObjectRef {
        let mut object = Object::new(
            Some(self.function_prototype.clone()),
            ObjectKind::Function(Function::Native(NativeFunction {
                name: Rc::from(name),
                call,
                construct,
                slots,
            })),
        );
        object
            .properties
            .insert(PropertyKey::from("name"), Property::hidden(Value::from(name)));
        heap.allocate(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_breaks_cycles() {
        let mut heap = Heap::default();
        let realm = Realm::new(&mut heap);
        let first = heap.allocate(Object::new(Some(realm.object_prototype.clone()), ObjectKind::Ordinary));
        let second = heap.allocate(Object::new(Some(first.clone()), ObjectKind::Ordinary));
        first
            .borrow_mut()
            .properties
            .insert(PropertyKey::from("next"), Property::enumerable(Value::Object(second.clone())));
        let weak = Rc::downgrade(&first);
        drop((first, second, realm));
        assert!(weak.upgrade().is_some());
        heap.release();
        assert!(weak.upgrade().is_none());
        assert_eq!(heap.live(), 0);
    }

    #[test]
    fn error_prototypes_chain_to_error() {
        let mut heap = Heap::default();
        let realm = Realm::new(&mut heap);
        let range = realm.error_prototype(ErrorKind::Range).borrow();
        let parent = range.prototype.clone().unwrap();
        assert!(Rc::ptr_eq(&parent, realm.error_prototype(ErrorKind::Error)));
    }
}
