//! Convenient re-exports for downstream crates.

pub use crate::config::{parse_size, AllocConfig};
pub use crate::error::{Error, Result};
pub use crate::id::OwnerId;
pub use crate::report::{Level, Reporter};
