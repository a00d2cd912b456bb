//! Error types for the inference engine

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while declaring or evaluating a model.
///
/// Declaration problems surface as [`Error::Configuration`] when the model is
/// built, never at evaluation time. Evaluation failures abort the current
/// field only; other fields of the same entity evaluator remain evaluable.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed declaration: invalid weight, missing candidates producer or
    /// score function, unknown dataset name, duplicate source binding
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A dataset producer failed, or a typed dataset access did not match
    /// the produced value
    #[error("Dataset `{dataset}` failed for field `{field}`: {message}")]
    Dataset {
        dataset: String,
        field: String,
        message: String,
    },

    /// A user block (candidates, canonicalize, prefer, score) failed
    #[error("{stage} block failed for {context}: {message}")]
    UserBlock {
        stage: &'static str,
        context: String,
        message: String,
    },

    /// Evaluation API called with an undeclared field name
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Drill-down requested for a source not declared on the field
    #[error("Unknown source `{source_name}` in field `{field}`")]
    UnknownSource { field: String, source_name: String },

    /// A user block invoked a helper that is neither registered nor
    /// resolvable as an entity attribute
    #[error("Unknown helper or entity attribute: {0}")]
    UnknownHelper(String),

    /// Host-supplied failure raised inside a user block
    #[error("Internal error: {0}")]
    Internal(String),
}
