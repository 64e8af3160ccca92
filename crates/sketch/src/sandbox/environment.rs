//! The capability table: the only names a script can reach.
//!
//! The program runs as the body of a function whose parameters are these
//! names, in this order. Nothing of the hosting process is reachable from it.

use super::builtins;
use super::realm::{Heap, Realm};
use super::value::Value;

pub const CAPABILITIES: [&str; 31] = [
    "console",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
    "Promise",
    "Array",
    "Object",
    "String",
    "Number",
    "Boolean",
    "Math",
    "Date",
    "RegExp",
    "JSON",
    "Map",
    "Set",
    "WeakMap",
    "WeakSet",
    "Symbol",
    "Error",
    "TypeError",
    "RangeError",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "encodeURI",
    "decodeURI",
    "encodeURIComponent",
    "decodeURIComponent",
];

pub struct Environment {
    bindings: Vec<(&'static str, Value)>,
}

impl Environment {
    pub fn new(heap: &mut Heap, realm: &Realm) -> Self {
        let mut installed = builtins::install(heap, realm);
        let bindings = CAPABILITIES
            .iter()
            .filter_map(|name| installed.remove(name).map(|value| (*name, value)))
            .collect();
        Self { bindings }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.bindings.iter().map(|(name, _)| *name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.bindings.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_capability_is_installed_in_order() {
        let mut heap = Heap::default();
        let realm = Realm::new(&mut heap);
        let environment = Environment::new(&mut heap, &realm);
        assert_eq!(environment.names().collect::<Vec<_>>(), CAPABILITIES.to_vec());
        assert_eq!(environment.len(), CAPABILITIES.len());
    }

    #[test]
    fn engine_internals_stay_hidden() {
        let mut heap = Heap::default();
        let realm = Realm::new(&mut heap);
        let environment = Environment::new(&mut heap, &realm);
        for hidden in ["ReferenceError", "SyntaxError", "URIError", "globalThis", "process", "require"] {
            assert!(environment.names().all(|name| name != hidden), "{hidden} is exposed");
        }
    }
}
