//! # Fieldwise
//!
//! Multi-source attribute inference engine. Given several heterogeneous,
//! partially overlapping datasets about the same entity, `fieldwise` produces
//! a single best-guess value for each declared field along with an auditable
//! score trail.
//!
//! A model is declared once per entity type: named datasets, shared helpers,
//! and fields, where each field combines one or more weighted sources. At
//! evaluation time raw candidates are grouped into equivalence classes by a
//! canonicalizer, a preferrer picks each class's representative, sources
//! score their classes, and the field evaluator merges the weighted
//! scorecards and selects the argmax.
//!
//! ```
//! use fieldwise::{Entity, Model, Value};
//!
//! struct Listing;
//!
//! impl Entity for Listing {
//!     fn attr(&self, _name: &str) -> Option<Value> {
//!         None
//!     }
//! }
//!
//! # fn main() -> fieldwise::Result<()> {
//! let model = Model::<Listing>::declare(|m| {
//!     m.dataset("phones", |_scope| {
//!         Ok(vec!["555.111.2222".to_string(), "(555) 111-2222".to_string()])
//!     });
//!     m.field("phone", |f| {
//!         f.canonicalize(|_scope, raw| {
//!             let digits: String = raw
//!                 .as_str()
//!                 .unwrap_or("")
//!                 .chars()
//!                 .filter(char::is_ascii_digit)
//!                 .collect();
//!             Ok(Value::Text(digits))
//!         });
//!         f.prefer(|_scope, _key, raws| Ok(raws[0].clone()));
//!         f.source("phones", 1.0, |s| {
//!             s.candidates(|scope| {
//!                 let rows = scope.dataset::<Vec<String>>()?;
//!                 Ok(rows.iter().map(|row| Value::from(row.as_str())).collect())
//!             });
//!             s.score(|_scope, _rep, raws| Ok(raws.len() as f64));
//!             Ok(())
//!         })
//!     })
//! })?;
//!
//! let listing = Listing;
//! let evaluator = model.evaluate(&listing);
//! assert_eq!(
//!     evaluator.best_value_for("phone")?,
//!     Some(Value::from("555.111.2222"))
//! );
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod error;
pub mod eval;
pub mod model;
pub mod scope;
pub mod scoring;
pub mod value;

pub use entity::Entity;
pub use error::{Error, Result};
pub use eval::{EntityEvaluator, FieldEvaluator, ScoredCandidate, SourceEvaluator};
pub use model::Model;
pub use scope::EvalScope;
pub use value::Value;
