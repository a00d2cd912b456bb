//! Declaration registry
//!
//! A [`Model`] is declared once per entity type and holds everything the
//! evaluators need: named dataset producers, shared helpers, and fields with
//! their weighted sources. Declarations are validated while the model is
//! built; the returned model has no mutable surface, so a declaration can
//! never drift after its first evaluation.

use std::any::Any;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::eval::EntityEvaluator;
use crate::scope::EvalScope;
use crate::value::Value;

pub(crate) type DatasetFn<E> = Rc<dyn Fn(&EvalScope<'_, E>) -> Result<Rc<dyn Any>>>;
pub(crate) type HelperFn<E> = Rc<dyn Fn(&EvalScope<'_, E>, &[Value]) -> Result<Value>>;
pub(crate) type CandidatesFn<E> = Rc<dyn Fn(&EvalScope<'_, E>) -> Result<Vec<Value>>>;
pub(crate) type CanonicalizeFn<E> = Rc<dyn Fn(&EvalScope<'_, E>, &Value) -> Result<Value>>;
pub(crate) type PreferFn<E> = Rc<dyn Fn(&EvalScope<'_, E>, &Value, &[Value]) -> Result<Value>>;
pub(crate) type ScoreFn<E> = Rc<dyn Fn(&EvalScope<'_, E>, &Value, &[Value]) -> Result<f64>>;

/// A declared field: canonicalizer, preferrer, and weighted sources.
pub(crate) struct FieldSpec<E> {
    pub(crate) name: String,
    pub(crate) canonicalize: Option<CanonicalizeFn<E>>,
    pub(crate) prefer: Option<PreferFn<E>>,
    pub(crate) sources: IndexMap<String, SourceSpec<E>>,
    pub(crate) weights: IndexMap<String, f64>,
}

impl<E> FieldSpec<E> {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            canonicalize: None,
            prefer: None,
            sources: IndexMap::new(),
            weights: IndexMap::new(),
        }
    }
}

/// A declared source: dataset binding, candidates producer, optional
/// canonicalizer/preferrer overrides, score function.
pub(crate) struct SourceSpec<E> {
    pub(crate) dataset: String,
    pub(crate) candidates: CandidatesFn<E>,
    pub(crate) canonicalize: Option<CanonicalizeFn<E>>,
    pub(crate) prefer: Option<PreferFn<E>>,
    pub(crate) score: ScoreFn<E>,
}

/// Immutable per-entity-type declaration of datasets, helpers, and fields.
pub struct Model<E> {
    pub(crate) datasets: IndexMap<String, DatasetFn<E>>,
    pub(crate) helpers: IndexMap<String, HelperFn<E>>,
    pub(crate) fields: IndexMap<String, FieldSpec<E>>,
}

impl<E: Entity> Model<E> {
    /// Open a declaration block and build the model.
    ///
    /// Configuration problems (invalid weights, missing candidates or score,
    /// unknown dataset names) surface here, not at evaluation time.
    pub fn declare<F>(body: F) -> Result<Self>
    where
        F: FnOnce(&mut ModelDecl<E>) -> Result<()>,
    {
        let mut decl = ModelDecl {
            datasets: IndexMap::new(),
            helpers: IndexMap::new(),
            fields: IndexMap::new(),
        };
        body(&mut decl)?;
        decl.finish()
    }

    /// Create an evaluator for one entity instance.
    pub fn evaluate<'a>(&'a self, entity: &'a E) -> EntityEvaluator<'a, E> {
        EntityEvaluator::new(self, entity)
    }

    /// Declared field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Declared dataset names, in declaration order.
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub(crate) fn field(&self, name: &str) -> Result<&FieldSpec<E>> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }
}

/// Declaration surface passed to the [`Model::declare`] body.
pub struct ModelDecl<E> {
    datasets: IndexMap<String, DatasetFn<E>>,
    helpers: IndexMap<String, HelperFn<E>>,
    fields: IndexMap<String, FieldSpec<E>>,
}

impl<E: Entity> ModelDecl<E> {
    /// Register a named dataset producer. Idempotent: the first declaration
    /// wins and later ones are ignored.
    ///
    /// The producer's return value is stored type-erased; source blocks
    /// recover it with [`EvalScope::dataset`] using the same `R`.
    pub fn dataset<R, F>(&mut self, name: &str, producer: F)
    where
        R: 'static,
        F: Fn(&EvalScope<'_, E>) -> Result<R> + 'static,
    {
        if self.datasets.contains_key(name) {
            debug!(dataset = name, "dataset already declared, keeping first");
            return;
        }
        let wrapped: DatasetFn<E> = Rc::new(move |scope| {
            let value = producer(scope)?;
            Ok(Rc::new(value) as Rc<dyn Any>)
        });
        self.datasets.insert(name.to_string(), wrapped);
    }

    /// Register a helper, replacing any earlier binding of the same name.
    pub fn helper<F>(&mut self, name: &str, callable: F)
    where
        F: Fn(&EvalScope<'_, E>, &[Value]) -> Result<Value> + 'static,
    {
        self.helpers.insert(name.to_string(), Rc::new(callable));
    }

    /// Register helpers that forward to entity attributes of the same name.
    /// Absent attributes forward as [`Value::Null`].
    pub fn share<I, S>(&mut self, attrs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for attr in attrs {
            let name: String = attr.into();
            let lookup = name.clone();
            self.helper(&name, move |scope, _args| {
                Ok(scope.attr(&lookup).unwrap_or(Value::Null))
            });
        }
    }

    /// Declare a field, or re-enter an existing field's declaration.
    ///
    /// Re-entry is additive: new sources append, and the existing
    /// canonicalizer/preferrer stay in place unless the body replaces them.
    pub fn field<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut FieldDecl<'_, E>) -> Result<()>,
    {
        let spec = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| FieldSpec::new(name));
        let mut decl = FieldDecl { spec };
        body(&mut decl)
    }

    fn finish(self) -> Result<Model<E>> {
        for field in self.fields.values() {
            for source in field.sources.values() {
                if !self.datasets.contains_key(&source.dataset) {
                    return Err(Error::Configuration(format!(
                        "field `{}` references unknown dataset `{}`",
                        field.name, source.dataset
                    )));
                }
            }
        }
        debug!(
            datasets = self.datasets.len(),
            helpers = self.helpers.len(),
            fields = self.fields.len(),
            "model declared"
        );
        Ok(Model {
            datasets: self.datasets,
            helpers: self.helpers,
            fields: self.fields,
        })
    }
}

/// Field declaration surface.
pub struct FieldDecl<'m, E> {
    spec: &'m mut FieldSpec<E>,
}

impl<'m, E: Entity> FieldDecl<'m, E> {
    /// Set the field-level canonicalizer (default: identity).
    pub fn canonicalize<F>(&mut self, f: F)
    where
        F: Fn(&EvalScope<'_, E>, &Value) -> Result<Value> + 'static,
    {
        self.spec.canonicalize = Some(Rc::new(f));
    }

    /// Set the field-level preferrer (default: the canonical key itself).
    pub fn prefer<F>(&mut self, f: F)
    where
        F: Fn(&EvalScope<'_, E>, &Value, &[Value]) -> Result<Value> + 'static,
    {
        self.spec.prefer = Some(Rc::new(f));
    }

    /// Register a source bound to `dataset` with the given weight.
    ///
    /// Weights must be finite and positive; they need not sum to 1.0 across
    /// the field's sources. Each dataset may back at most one source per
    /// field.
    pub fn source<F>(&mut self, dataset: &str, weight: f64, body: F) -> Result<()>
    where
        F: FnOnce(&mut SourceDecl<E>) -> Result<()>,
    {
        if !(weight.is_finite() && weight > 0.0) {
            return Err(Error::Configuration(format!(
                "source `{}` in field `{}` declared with invalid weight {}",
                dataset, self.spec.name, weight
            )));
        }
        if self.spec.sources.contains_key(dataset) {
            return Err(Error::Configuration(format!(
                "field `{}` already has a source bound to dataset `{}`",
                self.spec.name, dataset
            )));
        }
        let mut decl = SourceDecl {
            dataset: dataset.to_string(),
            field: self.spec.name.clone(),
            candidates: None,
            canonicalize: None,
            prefer: None,
            score: None,
        };
        body(&mut decl)?;
        let spec = decl.finish()?;
        self.spec.weights.insert(dataset.to_string(), weight);
        self.spec.sources.insert(dataset.to_string(), spec);
        Ok(())
    }
}

/// Source declaration surface.
pub struct SourceDecl<E> {
    dataset: String,
    field: String,
    candidates: Option<CandidatesFn<E>>,
    canonicalize: Option<CanonicalizeFn<E>>,
    prefer: Option<PreferFn<E>>,
    score: Option<ScoreFn<E>>,
}

impl<E: Entity> SourceDecl<E> {
    /// Set the raw-candidate producer (required).
    pub fn candidates<F>(&mut self, f: F)
    where
        F: Fn(&EvalScope<'_, E>) -> Result<Vec<Value>> + 'static,
    {
        self.candidates = Some(Rc::new(f));
    }

    /// Override the field's canonicalizer for this source.
    pub fn canonicalize<F>(&mut self, f: F)
    where
        F: Fn(&EvalScope<'_, E>, &Value) -> Result<Value> + 'static,
    {
        self.canonicalize = Some(Rc::new(f));
    }

    /// Override the field's preferrer for this source.
    pub fn prefer<F>(&mut self, f: F)
    where
        F: Fn(&EvalScope<'_, E>, &Value, &[Value]) -> Result<Value> + 'static,
    {
        self.prefer = Some(Rc::new(f));
    }

    /// Set the score function (required). Receives the class's preferred
    /// representative and its raw members.
    pub fn score<F>(&mut self, f: F)
    where
        F: Fn(&EvalScope<'_, E>, &Value, &[Value]) -> Result<f64> + 'static,
    {
        self.score = Some(Rc::new(f));
    }

    fn finish(self) -> Result<SourceSpec<E>> {
        let candidates = self.candidates.ok_or_else(|| {
            Error::Configuration(format!(
                "source `{}` in field `{}` declared without a candidates producer",
                self.dataset, self.field
            ))
        })?;
        let score = self.score.ok_or_else(|| {
            Error::Configuration(format!(
                "source `{}` in field `{}` declared without a score function",
                self.dataset, self.field
            ))
        })?;
        Ok(SourceSpec {
            dataset: self.dataset,
            candidates,
            canonicalize: self.canonicalize,
            prefer: self.prefer,
            score,
        })
    }
}
