//! Abstract reporting interface.
//!
//! The concrete sinks live in `pixmem-alloc`. We keep only the trait here so
//! a host can route allocator diagnostics into its own warning channel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Warn => f.write_str("warn"),
            Level::Error => f.write_str("error"),
        }
    }
}

/// A sink for `(domain, message)` diagnostics.
///
/// Implementations must be cheap and must not allocate through the tracked
/// allocator, since they are called from its free path.
pub trait Reporter: Send + Sync {
    /// Emit a non-fatal warning.
    fn warn(&self, domain: &str, message: &str);

    /// Emit an error. Defaults to a warning.
    fn error(&self, domain: &str, message: &str) {
        self.warn(domain, message)
    }
}

// NOTE: Do *not* add a blanket no-op impl here. Silently dropping accounting
// warnings hides over-free bugs in callers.
