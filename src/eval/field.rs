//! Field evaluator: weight, merge, regroup, select

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use serde::Serialize;
use tracing::{debug, warn};

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::eval::SourceEvaluator;
use crate::model::{FieldSpec, Model};
use crate::scope::EvalScope;
use crate::value::Value;

/// One member of a field-canonical group: a representative that survived the
/// per-source prefer step, with its summed weighted score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Value,
    pub score: f64,
}

/// Combines the field's source scorecards into a final value.
///
/// Stages mirror the audit trail: per-source scorecards, weighted
/// scorecards, the cross-source sum, the field-canonical regrouping, the
/// final scores, and the argmax. Each stage is memoized independently so
/// introspection never recomputes and `best_value` never runs more than the
/// pipeline it needs.
pub struct FieldEvaluator<'a, E> {
    model: &'a Model<E>,
    spec: &'a FieldSpec<E>,
    entity: &'a E,
    sources: RefCell<IndexMap<String, Rc<SourceEvaluator<'a, E>>>>,
    sourced_unweighted: OnceCell<IndexMap<String, IndexMap<Value, f64>>>,
    sourced_weighted: OnceCell<IndexMap<String, IndexMap<Value, f64>>>,
    ungrouped: OnceCell<IndexMap<Value, f64>>,
    grouped: OnceCell<IndexMap<Value, Vec<ScoredCandidate>>>,
    scores: OnceCell<IndexMap<Value, f64>>,
}

// Weights scale scores exactly once, here; scores that came back negative or
// non-finite contribute nothing.
fn sanitize(score: f64) -> f64 {
    if score.is_finite() && score > 0.0 {
        score
    } else {
        0.0
    }
}

impl<'a, E: Entity> FieldEvaluator<'a, E> {
    pub(crate) fn new(model: &'a Model<E>, spec: &'a FieldSpec<E>, entity: &'a E) -> Self {
        Self {
            model,
            spec,
            entity,
            sources: RefCell::new(IndexMap::new()),
            sourced_unweighted: OnceCell::new(),
            sourced_weighted: OnceCell::new(),
            ungrouped: OnceCell::new(),
            grouped: OnceCell::new(),
            scores: OnceCell::new(),
        }
    }

    /// The field's name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Names of the field's sources, in declaration order.
    pub fn source_names(&self) -> Vec<String> {
        self.spec.sources.keys().cloned().collect()
    }

    /// Declared weight of a source; 0 when undeclared.
    pub fn weight_of(&self, source: &str) -> f64 {
        self.spec.weights.get(source).copied().unwrap_or(0.0)
    }

    /// Source evaluator for the source bound to `source`, created on first
    /// access and cached for the life of this field evaluator.
    pub fn evaluator_for(&self, source: &str) -> Result<Rc<SourceEvaluator<'a, E>>> {
        if let Some(existing) = self.sources.borrow().get(source) {
            return Ok(Rc::clone(existing));
        }
        let spec = self
            .spec
            .sources
            .get(source)
            .ok_or_else(|| Error::UnknownSource {
                field: self.spec.name.clone(),
                source_name: source.to_string(),
            })?;
        let evaluator = Rc::new(SourceEvaluator::new(self.model, self.spec, spec, self.entity));
        self.sources
            .borrow_mut()
            .insert(source.to_string(), Rc::clone(&evaluator));
        Ok(evaluator)
    }

    /// Source name → raw per-source scorecard.
    pub fn sourced_unweighted_scores(&self) -> Result<&IndexMap<String, IndexMap<Value, f64>>> {
        self.sourced_unweighted.get_or_try_init(|| {
            let mut sourced = IndexMap::new();
            for name in self.spec.sources.keys() {
                let evaluator = self.evaluator_for(name)?;
                let scores = evaluator.scores()?.clone();
                sourced.insert(name.clone(), scores);
            }
            Ok(sourced)
        })
    }

    /// Source name → weight-scaled scorecard.
    pub fn sourced_weighted_scores(&self) -> Result<&IndexMap<String, IndexMap<Value, f64>>> {
        self.sourced_weighted.get_or_try_init(|| {
            let mut weighted = IndexMap::new();
            for (name, scores) in self.sourced_unweighted_scores()? {
                let weight = self.weight_of(name);
                let scaled: IndexMap<Value, f64> = scores
                    .iter()
                    .map(|(representative, raw)| (representative.clone(), weight * sanitize(*raw)))
                    .collect();
                weighted.insert(name.clone(), scaled);
            }
            Ok(weighted)
        })
    }

    /// Weighted scores summed across sources, keyed by exact representative
    /// equality. Source declaration order first, producer order within.
    pub fn ungrouped_scores(&self) -> Result<&IndexMap<Value, f64>> {
        self.ungrouped.get_or_try_init(|| {
            let mut summed: IndexMap<Value, f64> = IndexMap::new();
            for scores in self.sourced_weighted_scores()?.values() {
                for (representative, score) in scores {
                    *summed.entry(representative.clone()).or_insert(0.0) += score;
                }
            }
            Ok(summed)
        })
    }

    /// Ungrouped entries regrouped under the field-level canonicalizer.
    pub fn grouped_scores(&self) -> Result<&IndexMap<Value, Vec<ScoredCandidate>>> {
        self.grouped.get_or_try_init(|| {
            let scope = self.scope();
            let mut grouped: IndexMap<Value, Vec<ScoredCandidate>> = IndexMap::new();
            for (candidate, score) in self.ungrouped_scores()? {
                let key = match &self.spec.canonicalize {
                    Some(canonicalize) => canonicalize(&scope, candidate)
                        .map_err(|err| self.user_block_err("canonicalize", err))?,
                    None => candidate.clone(),
                };
                grouped.entry(key).or_default().push(ScoredCandidate {
                    candidate: candidate.clone(),
                    score: *score,
                });
            }
            Ok(grouped)
        })
    }

    /// Final representative → summed group score.
    pub fn scores(&self) -> Result<&IndexMap<Value, f64>> {
        self.scores.get_or_try_init(|| {
            let scope = self.scope();
            let mut finals: IndexMap<Value, f64> = IndexMap::new();
            for (key, members) in self.grouped_scores()? {
                let candidates: Vec<Value> =
                    members.iter().map(|member| member.candidate.clone()).collect();
                let representative = match &self.spec.prefer {
                    Some(prefer) => prefer(&scope, key, candidates.as_slice())
                        .map_err(|err| self.user_block_err("prefer", err))?,
                    None => key.clone(),
                };
                let total: f64 = members.iter().map(|member| member.score).sum();
                if let Some(previous) = finals.insert(representative, total) {
                    warn!(
                        field = %self.spec.name,
                        previous,
                        "final representative collision, keeping the later class"
                    );
                }
            }
            debug!(field = %self.spec.name, classes = finals.len(), "final scores");
            Ok(finals)
        })
    }

    /// The final representative with the maximum score.
    ///
    /// Ties break to the first-inserted representative; an all-zero
    /// scorecard yields its first representative; an empty one yields
    /// `None`.
    pub fn best_value(&self) -> Result<Option<&Value>> {
        let scores = self.scores()?;
        let mut best: Option<(&Value, f64)> = None;
        for (candidate, score) in scores {
            let replace = match best {
                None => true,
                Some((_, top)) => *score > top,
            };
            if replace {
                best = Some((candidate, *score));
            }
        }
        Ok(best.map(|(candidate, _)| candidate))
    }

    fn scope(&self) -> EvalScope<'_, E> {
        EvalScope::new(self.entity, &self.model.helpers, &self.spec.name)
    }

    fn user_block_err(&self, stage: &'static str, err: Error) -> Error {
        match err {
            wrapped @ Error::UserBlock { .. } => wrapped,
            err => Error::UserBlock {
                stage,
                context: format!("field `{}`", self.spec.name),
                message: err.to_string(),
            },
        }
    }
}
