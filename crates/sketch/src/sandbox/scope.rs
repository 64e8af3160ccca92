//! Lexical environments.

use super::value::{ObjectRef, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type ScopeRef = Rc<Scope>;

struct Binding {
    // None until a `let`/`const`/`class` declaration runs.
    value: Option<Value>,
    mutable: bool,
}

/// What `this` and `super` mean inside a non-arrow function.
pub struct FunctionContext {
    pub this: Value,
    pub home_object: Option<ObjectRef>,
    /// Class whose constructor is running, for `super(...)`.
    pub class: Option<ObjectRef>,
}

pub enum Lookup {
    Found(Value),
    Uninitialized,
    Missing,
}

pub enum AssignError {
    Missing,
    Uninitialized,
    Constant,
}

pub struct Scope {
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<ScopeRef>,
    context: Option<Rc<FunctionContext>>,
    // `var` declarations land in the nearest function scope.
    is_function: bool,
}

impl Scope {
    pub fn root() -> ScopeRef {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: None,
            context: None,
            is_function: true,
        })
    }

    /// Arrow functions pass no context and inherit the enclosing one.
    pub fn function(parent: &ScopeRef, context: Option<FunctionContext>) -> ScopeRef {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: Some(parent.clone()),
            context: context.map(Rc::new),
            is_function: true,
        })
    }

    pub fn block(parent: &ScopeRef) -> ScopeRef {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: Some(parent.clone()),
            context: None,
            is_function: false,
        })
    }

    pub fn declare(&self, name: &str, value: Option<Value>, mutable: bool) {
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// `var` semantics: an existing binding keeps its value.
    pub fn declare_var(self: &Rc<Self>, name: &str) {
        let scope = self.function_scope();
        let mut bindings = scope.bindings.borrow_mut();
        bindings.entry(name.to_string()).or_insert(Binding {
            value: Some(Value::Undefined),
            mutable: true,
        });
    }

    pub fn initialize(&self, name: &str, value: Value) {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            binding.value = Some(value);
        }
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Lookup {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.bindings.borrow().get(name) {
                return match &binding.value {
                    Some(value) => Lookup::Found(value.clone()),
                    None => Lookup::Uninitialized,
                };
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return Lookup::Missing,
            }
        }
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.bindings.borrow_mut().get_mut(name) {
                return match (&binding.value, binding.mutable) {
                    (None, _) => Err(AssignError::Uninitialized),
                    (Some(_), false) => Err(AssignError::Constant),
                    (Some(_), true) => {
                        binding.value = Some(value);
                        Ok(())
                    }
                };
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return Err(AssignError::Missing),
            }
        }
    }

    pub fn context(&self) -> Option<Rc<FunctionContext>> {
        let mut scope = self;
        loop {
            if let Some(context) = &scope.context {
                return Some(context.clone());
            }
            scope = scope.parent.as_ref()?;
        }
    }

    fn function_scope(self: &Rc<Self>) -> ScopeRef {
        let mut scope = self.clone();
        while !scope.is_function {
            match &scope.parent {
                Some(parent) => scope = parent.clone(),
                None => break,
            }
        }
        scope
    }

    /// Fresh block scope holding copies of `names`, for `let` loop iterations.
    pub fn copy_bindings(&self, names: &[String]) -> ScopeRef {
        let copy = Rc::new(Self {
            bindings: RefCell::default(),
            parent: self.parent.clone(),
            context: None,
            is_function: false,
        });
        {
            let bindings = self.bindings.borrow();
            let mut copied = copy.bindings.borrow_mut();
            for name in names {
                if let Some(binding) = bindings.get(name) {
                    copied.insert(
                        name.clone(),
                        Binding {
                            value: binding.value.clone(),
                            mutable: binding.mutable,
                        },
                    );
                }
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parents() {
        let root = Scope::root();
        root.declare("a", Some(Value::Number(1.0)), true);
        let block = Scope::block(&root);
        assert!(matches!(block.lookup("a"), Lookup::Found(Value::Number(n)) if n == 1.0));
        assert!(matches!(block.lookup("b"), Lookup::Missing));
    }

    #[test]
    fn temporal_dead_zone_and_constants() {
        let root = Scope::root();
        root.declare("later", None, true);
        root.declare("fixed", Some(Value::Null), false);
        assert!(matches!(root.lookup("later"), Lookup::Uninitialized));
        assert!(matches!(root.assign("later", Value::Null), Err(AssignError::Uninitialized)));
        assert!(matches!(root.assign("fixed", Value::Null), Err(AssignError::Constant)));
        root.initialize("later", Value::Boolean(true));
        assert!(matches!(root.lookup("later"), Lookup::Found(Value::Boolean(true))));
    }

    #[test]
    fn var_goes_to_function_scope() {
        let root = Scope::root();
        let function = Scope::function(&root, None);
        let block = Scope::block(&function);
        block.declare_var("v");
        assert!(function.has_own("v"));
        assert!(!block.has_own("v"));
    }
}
