//! Shared fixtures for integration tests

pub mod log_capture;

pub use log_capture::init_test_logging;

use fieldwise::{Entity, Value};
use indexmap::IndexMap;

/// Minimal entity: a bag of named attributes.
#[derive(Default)]
pub struct Property {
    attrs: IndexMap<String, Value>,
}

impl Property {
    pub fn with(attrs: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Self {
            attrs: attrs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }
}

impl Entity for Property {
    fn attr(&self, name: &str) -> Option<Value> {
        self.attrs.get(name).cloned()
    }
}

/// One row of a listings-style dataset.
#[derive(Clone, Debug)]
pub struct ListingRow {
    pub zip: String,
    pub acres: f64,
}

pub fn listing(zip: &str, acres: f64) -> ListingRow {
    ListingRow {
        zip: zip.to_string(),
        acres,
    }
}
