#![forbid(unsafe_code)]
//! pixmem-core: shared types for the pixmem allocator crates.
//!
//! This crate holds configuration, identifiers, error types, and the
//! reporting interface. The allocators themselves live in `pixmem-alloc`, so
//! any crate can depend on these types without pulling in unsafe code.

pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod report;

pub use config::{parse_size, AllocConfig};
pub use error::{Error, Result};
pub use id::OwnerId;
pub use report::{Level, Reporter};
