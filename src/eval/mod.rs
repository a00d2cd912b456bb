//! Evaluators
//!
//! Lazily-computed, memoized views over `(entity, field)` and
//! `(entity, field, source)`. Evaluation is single-threaded per entity
//! instance; every stage is a deterministic function of declaration order,
//! producer output order, and entity state, and is computed at most once.
//! Failed stages are never cached, so a fixed entity can be re-evaluated
//! after a transient producer failure.

mod field;
mod source;

pub use field::{FieldEvaluator, ScoredCandidate};
pub use source::SourceEvaluator;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::entity::Entity;
use crate::error::Result;
use crate::model::Model;
use crate::value::Value;

/// Top-level evaluation handle for one entity instance.
///
/// Field evaluators are created on first access and live as long as this
/// evaluator, so repeated queries against the same field never recompute.
pub struct EntityEvaluator<'a, E> {
    model: &'a Model<E>,
    entity: &'a E,
    fields: RefCell<IndexMap<String, Rc<FieldEvaluator<'a, E>>>>,
}

impl<'a, E: Entity> EntityEvaluator<'a, E> {
    pub(crate) fn new(model: &'a Model<E>, entity: &'a E) -> Self {
        Self {
            model,
            entity,
            fields: RefCell::new(IndexMap::new()),
        }
    }

    /// Field evaluator for `field`, created on first access.
    pub fn evaluator_for(&self, field: &str) -> Result<Rc<FieldEvaluator<'a, E>>> {
        if let Some(existing) = self.fields.borrow().get(field) {
            return Ok(Rc::clone(existing));
        }
        let spec = self.model.field(field)?;
        let evaluator = Rc::new(FieldEvaluator::new(self.model, spec, self.entity));
        self.fields
            .borrow_mut()
            .insert(field.to_string(), Rc::clone(&evaluator));
        Ok(evaluator)
    }

    /// The field's best value, or `None` when no source produced candidates.
    pub fn best_value_for(&self, field: &str) -> Result<Option<Value>> {
        let evaluator = self.evaluator_for(field)?;
        let best = evaluator.best_value()?.cloned();
        Ok(best)
    }

    /// The field's final representative → score mapping.
    pub fn scores_for(&self, field: &str) -> Result<IndexMap<Value, f64>> {
        let evaluator = self.evaluator_for(field)?;
        let scores = evaluator.scores()?.clone();
        Ok(scores)
    }

    /// Eagerly compute the best value of every declared field.
    ///
    /// The first failing field aborts the call; per-field isolation remains
    /// available through [`EntityEvaluator::best_value_for`].
    pub fn field_values(&self) -> Result<IndexMap<String, Option<Value>>> {
        let mut values = IndexMap::new();
        for name in self.model.fields.keys() {
            let evaluator = self.evaluator_for(name)?;
            values.insert(name.clone(), evaluator.best_value()?.cloned());
        }
        Ok(values)
    }
}
