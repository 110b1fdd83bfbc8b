//! Telemetry capability: named events and failures.
//!
//! Components report through a [`Reporter`] instead of logging directly so the
//! gateway can route telemetry elsewhere and tests can observe it.

use std::sync::Mutex;

pub trait Reporter: Send + Sync {
    /// Record a named event with string attributes.
    fn record_event(&self, name: &str, attributes: &[(&str, &str)]);
    /// Record a failure that was handled (or is about to be surfaced).
    fn record_failure(&self, error: &(dyn std::error::Error + 'static));
}

/// Reporter that writes to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn record_event(&self, name: &str, attributes: &[(&str, &str)]) {
        let attrs = attributes
            .iter()
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        log::info!("{} {}", name, attrs);
    }

    fn record_failure(&self, error: &(dyn std::error::Error + 'static)) {
        log::error!("{}", error);
    }
}

/// One recorded telemetry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Event {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Failure(String),
}

/// In-memory reporter; keeps every entry for later inspection.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Mutex<Vec<Report>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Report> {
        self.entries.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Names of recorded events, in order.
    pub fn event_names(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|r| match r {
                Report::Event { name, .. } => Some(name),
                Report::Failure(_) => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|r| match r {
                Report::Failure(msg) => Some(msg),
                Report::Event { .. } => None,
            })
            .collect()
    }

    fn push(&self, report: Report) {
        if let Ok(mut g) = self.entries.lock() {
            g.push(report);
        }
    }
}

impl Reporter for MemoryReporter {
    fn record_event(&self, name: &str, attributes: &[(&str, &str)]) {
        self.push(Report::Event {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }

    fn record_failure(&self, error: &(dyn std::error::Error + 'static)) {
        self.push(Report::Failure(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn memory_reporter_keeps_order() {
        let reporter = MemoryReporter::new();
        reporter.record_event("first", &[("k", "v")]);
        reporter.record_failure(&BridgeError::Validation("from"));
        reporter.record_event("second", &[]);
        assert_eq!(reporter.event_names(), vec!["first", "second"]);
        assert_eq!(reporter.failures(), vec!["missing required field: from"]);
        assert_eq!(
            reporter.entries()[0],
            Report::Event {
                name: "first".to_string(),
                attributes: vec![("k".to_string(), "v".to_string())],
            }
        );
    }
}
