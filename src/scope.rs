//! Evaluation context for user blocks
//!
//! Every user-supplied closure (candidates, canonicalize, prefer, score,
//! dataset producers, helpers) receives an [`EvalScope`]. The scope exposes
//! the registered helpers by name, the entity's public attributes, and — in
//! source-level blocks — the memoized dataset value bound to the source.
//! Names the scope does not define forward to the entity.

use std::any::Any;

use indexmap::IndexMap;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::model::HelperFn;
use crate::value::Value;

/// Per-block runtime scope.
///
/// Helpers may call other helpers and read the dataset of the block they run
/// in; helpers are not reachable outside user blocks.
pub struct EvalScope<'a, E> {
    entity: &'a E,
    helpers: &'a IndexMap<String, HelperFn<E>>,
    field: &'a str,
    dataset_name: Option<&'a str>,
    dataset: Option<&'a dyn Any>,
}

impl<'a, E: Entity> EvalScope<'a, E> {
    pub(crate) fn new(
        entity: &'a E,
        helpers: &'a IndexMap<String, HelperFn<E>>,
        field: &'a str,
    ) -> Self {
        Self {
            entity,
            helpers,
            field,
            dataset_name: None,
            dataset: None,
        }
    }

    pub(crate) fn with_dataset(
        entity: &'a E,
        helpers: &'a IndexMap<String, HelperFn<E>>,
        field: &'a str,
        dataset_name: &'a str,
        dataset: &'a dyn Any,
    ) -> Self {
        Self {
            entity,
            helpers,
            field,
            dataset_name: Some(dataset_name),
            dataset: Some(dataset),
        }
    }

    /// The entity instance under evaluation.
    pub fn entity(&self) -> &E {
        self.entity
    }

    /// Name of the field whose block is currently running.
    pub fn field(&self) -> &str {
        self.field
    }

    /// Read an entity attribute.
    pub fn attr(&self, name: &str) -> Option<Value> {
        self.entity.attr(name)
    }

    /// Invoke a registered helper by name.
    ///
    /// A zero-argument call on an unregistered name resolves as an entity
    /// attribute read before failing with [`Error::UnknownHelper`].
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        if let Some(helper) = self.helpers.get(name) {
            return helper(self, args);
        }
        if args.is_empty() {
            if let Some(value) = self.entity.attr(name) {
                return Ok(value);
            }
        }
        Err(Error::UnknownHelper(name.to_string()))
    }

    /// Typed access to the dataset bound to the current source block.
    ///
    /// `R` must be the exact type returned by the dataset's producer.
    pub fn dataset<R: 'static>(&self) -> Result<&R> {
        let name = self.dataset_name.unwrap_or("<unbound>");
        let dataset = self.dataset.ok_or_else(|| Error::Dataset {
            dataset: name.to_string(),
            field: self.field.to_string(),
            message: "no dataset is bound in this block".to_string(),
        })?;
        dataset.downcast_ref::<R>().ok_or_else(|| Error::Dataset {
            dataset: name.to_string(),
            field: self.field.to_string(),
            message: format!("dataset value is not a {}", std::any::type_name::<R>()),
        })
    }
}
