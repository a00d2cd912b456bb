//! Entity abstraction
//!
//! The entity is the domain object whose attributes are being inferred. The
//! engine never inspects it directly; user blocks read it through the
//! evaluation scope, which forwards unresolved names here.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::value::Value;

/// The domain object whose attributes are being inferred.
pub trait Entity {
    /// Look up a public attribute by name. `None` means the entity does not
    /// expose the attribute.
    fn attr(&self, name: &str) -> Option<Value>;
}

/// Entities with no readable attributes.
impl Entity for () {
    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl Entity for HashMap<String, Value> {
    fn attr(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Entity for IndexMap<String, Value> {
    fn attr(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}
