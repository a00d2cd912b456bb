//! Tracing log capture for tests
//!
//! The engine reports surprising-but-legal situations (representative
//! collisions, out-of-range scores) through `tracing` warnings rather than
//! errors. This layer captures emitted records so tests can assert on them.

use std::sync::{Arc, Mutex};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Captured log record
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Log capture layer for testing
#[derive(Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured records so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Check if any captured message contains `pattern`
    pub fn contains(&self, pattern: &str) -> bool {
        self.records().iter().any(|r| r.message.contains(pattern))
    }

    /// Count captured messages containing `pattern`
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.message.contains(pattern))
            .count()
    }

    /// Assert at least one captured message contains `pattern`
    pub fn assert_contains(&self, pattern: &str) {
        assert!(
            self.contains(pattern),
            "Expected log matching '{}', but none found. All logs:\n{}",
            pattern,
            self.records()
                .iter()
                .map(|r| r.message.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}

impl<S> tracing_subscriber::Layer<S> for LogCapture
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        use tracing::field::Visit;

        struct MessageVisitor {
            message: String,
        }

        impl Visit for MessageVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = format!("{:?}", value);
                    // Remove surrounding quotes
                    if self.message.starts_with('"') && self.message.ends_with('"') {
                        self.message = self.message[1..self.message.len() - 1].to_string();
                    }
                }
            }
        }

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        self.records.lock().unwrap().push(LogRecord {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
        });
    }
}

/// Initialize test logging with log capture
///
/// Returns a LogCapture handle for asserting on emitted records. Safe to
/// call from multiple tests; only the first call in a process installs the
/// subscriber, and all calls share its capture buffer.
pub fn init_test_logging() -> LogCapture {
    use once_cell::sync::Lazy;

    static CAPTURE: Lazy<LogCapture> = Lazy::new(|| {
        let capture = LogCapture::new();
        let _ = tracing_subscriber::registry()
            .with(capture.clone())
            .try_init();
        capture
    });

    CAPTURE.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_and_matches_patterns() {
        let capture = LogCapture::new();

        capture.records.lock().unwrap().push(LogRecord {
            level: Level::WARN,
            target: "test".to_string(),
            message: "scored 3 equivalence classes".to_string(),
        });
        capture.records.lock().unwrap().push(LogRecord {
            level: Level::DEBUG,
            target: "test".to_string(),
            message: "grouped raw candidates".to_string(),
        });

        assert_eq!(capture.records().len(), 2);
        assert!(capture.contains("equivalence classes"));
        assert_eq!(capture.count_matching("grouped"), 1);
        capture.assert_contains("scored");
    }

    #[test]
    #[should_panic(expected = "Expected log matching")]
    fn assert_contains_fails_without_a_match() {
        let capture = LogCapture::new();
        capture.assert_contains("nonexistent pattern");
    }
}
