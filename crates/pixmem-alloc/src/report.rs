//! Concrete [`Reporter`] sinks.

use std::sync::{Mutex, PoisonError};

use pixmem_core::report::{Level, Reporter};

/// Forwards reports to `tracing`. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn warn(&self, domain: &str, message: &str) {
        tracing::warn!(domain, "{}", message);
    }

    fn error(&self, domain: &str, message: &str) {
        tracing::error!(domain, "{}", message);
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub level: Level,
    pub domain: String,
    pub message: String,
}

/// Keeps every report in memory. Handy for hosts that surface diagnostics
/// later, and for tests.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<Report>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: Level, domain: &str, message: &str) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Report {
                level,
                domain: domain.to_string(),
                message: message.to_string(),
            });
    }

    /// Copy of everything reported so far.
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything reported so far.
    pub fn take(&self) -> Vec<Report> {
        std::mem::take(&mut *self.reports.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of reports whose message contains `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.message.contains(needle))
            .count()
    }
}

impl Reporter for CollectingReporter {
    fn warn(&self, domain: &str, message: &str) {
        self.push(Level::Warn, domain, message);
    }

    fn error(&self, domain: &str, message: &str) {
        self.push(Level::Error, domain, message);
    }
}
