//! Source evaluator: raw candidates → equivalence classes → scores

use std::any::Any;
use std::rc::Rc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::model::{CanonicalizeFn, FieldSpec, Model, PreferFn, SourceSpec};
use crate::scope::EvalScope;
use crate::value::Value;

/// Produces the equivalence-class → score mapping of one source of one
/// field, for one entity instance.
///
/// The pipeline runs in three memoized stages: group raw candidates by
/// canonical key, pick a preferred representative per class, score each
/// class. The dataset value is materialized once per source evaluator, so
/// two sources bound to the same dataset name stay independent.
pub struct SourceEvaluator<'a, E> {
    model: &'a Model<E>,
    field: &'a FieldSpec<E>,
    spec: &'a SourceSpec<E>,
    entity: &'a E,
    dataset: OnceCell<Rc<dyn Any>>,
    raw_candidates: OnceCell<IndexMap<Value, Vec<Value>>>,
    candidates: OnceCell<IndexMap<Value, Vec<Value>>>,
    scores: OnceCell<IndexMap<Value, f64>>,
}

impl<'a, E: Entity> SourceEvaluator<'a, E> {
    pub(crate) fn new(
        model: &'a Model<E>,
        field: &'a FieldSpec<E>,
        spec: &'a SourceSpec<E>,
        entity: &'a E,
    ) -> Self {
        Self {
            model,
            field,
            spec,
            entity,
            dataset: OnceCell::new(),
            raw_candidates: OnceCell::new(),
            candidates: OnceCell::new(),
            scores: OnceCell::new(),
        }
    }

    /// Name of the dataset this source is bound to.
    pub fn dataset_name(&self) -> &str {
        &self.spec.dataset
    }

    fn materialize_dataset(&self) -> Result<&Rc<dyn Any>> {
        self.dataset.get_or_try_init(|| {
            let producer = self.model.datasets.get(&self.spec.dataset).ok_or_else(|| {
                Error::Configuration(format!(
                    "source `{}` in field `{}` references unknown dataset",
                    self.spec.dataset, self.field.name
                ))
            })?;
            let scope = EvalScope::new(self.entity, &self.model.helpers, &self.field.name);
            producer(&scope).map_err(|err| match err {
                wrapped @ Error::Dataset { .. } => wrapped,
                err => Error::Dataset {
                    dataset: self.spec.dataset.clone(),
                    field: self.field.name.clone(),
                    message: err.to_string(),
                },
            })
        })
    }

    fn scope(&self) -> Result<EvalScope<'_, E>> {
        let dataset = self.materialize_dataset()?;
        Ok(EvalScope::with_dataset(
            self.entity,
            &self.model.helpers,
            &self.field.name,
            &self.spec.dataset,
            &**dataset,
        ))
    }

    fn canonicalizer(&self) -> Option<&CanonicalizeFn<E>> {
        self.spec
            .canonicalize
            .as_ref()
            .or(self.field.canonicalize.as_ref())
    }

    fn preferrer(&self) -> Option<&PreferFn<E>> {
        self.spec.prefer.as_ref().or(self.field.prefer.as_ref())
    }

    /// Raw candidates grouped by canonical key. Producer order is preserved
    /// within each class. Null candidates pass through canonicalization
    /// unchanged; the producer owns filtering.
    pub fn raw_candidates(&self) -> Result<&IndexMap<Value, Vec<Value>>> {
        self.raw_candidates.get_or_try_init(|| {
            let scope = self.scope()?;
            let raws = (self.spec.candidates)(&scope)
                .map_err(|err| self.user_block_err("candidates", err))?;
            let mut classes: IndexMap<Value, Vec<Value>> = IndexMap::new();
            for raw in raws {
                let key = match self.canonicalizer() {
                    Some(canonicalize) => canonicalize(&scope, &raw)
                        .map_err(|err| self.user_block_err("canonicalize", err))?,
                    None => raw.clone(),
                };
                classes.entry(key).or_default().push(raw);
            }
            debug!(
                field = %self.field.name,
                source = %self.spec.dataset,
                classes = classes.len(),
                "grouped raw candidates"
            );
            Ok(classes)
        })
    }

    /// Equivalence classes keyed by their preferred representative.
    ///
    /// Representative collisions between classes concatenate the raw lists;
    /// the earlier entry keeps its insertion position.
    pub fn candidates(&self) -> Result<&IndexMap<Value, Vec<Value>>> {
        self.candidates.get_or_try_init(|| {
            let scope = self.scope()?;
            let mut preferred: IndexMap<Value, Vec<Value>> = IndexMap::new();
            for (key, raws) in self.raw_candidates()? {
                let representative = match self.preferrer() {
                    Some(prefer) => prefer(&scope, key, raws.as_slice())
                        .map_err(|err| self.user_block_err("prefer", err))?,
                    None => key.clone(),
                };
                match preferred.entry(representative) {
                    Entry::Occupied(mut entry) => {
                        warn!(
                            field = %self.field.name,
                            source = %self.spec.dataset,
                            representative = %entry.key(),
                            "preferred representative collision, concatenating classes"
                        );
                        entry.get_mut().extend(raws.iter().cloned());
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(raws.clone());
                    }
                }
            }
            Ok(preferred)
        })
    }

    /// Per-class scores exactly as the score function returned them.
    ///
    /// Negative and non-finite values are kept here for introspection; the
    /// field evaluator sanitizes them to 0 when weighting.
    pub fn scores(&self) -> Result<&IndexMap<Value, f64>> {
        self.scores.get_or_try_init(|| {
            let scope = self.scope()?;
            let mut scores = IndexMap::new();
            for (representative, raws) in self.candidates()? {
                let score = (self.spec.score)(&scope, representative, raws.as_slice())
                    .map_err(|err| self.user_block_err("score", err))?;
                if !(score.is_finite() && score >= 0.0) {
                    warn!(
                        field = %self.field.name,
                        source = %self.spec.dataset,
                        representative = %representative,
                        score,
                        "score outside [0, inf), treated as 0 when aggregating"
                    );
                }
                scores.insert(representative.clone(), score);
            }
            debug!(
                field = %self.field.name,
                source = %self.spec.dataset,
                classes = scores.len(),
                "scored equivalence classes"
            );
            Ok(scores)
        })
    }

    fn user_block_err(&self, stage: &'static str, err: Error) -> Error {
        match err {
            wrapped @ Error::UserBlock { .. } => wrapped,
            err => Error::UserBlock {
                stage,
                context: format!(
                    "field `{}`, source `{}`",
                    self.field.name, self.spec.dataset
                ),
                message: err.to_string(),
            },
        }
    }
}
