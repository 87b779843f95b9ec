//! pixmem: instrumented allocation for large, short-lived pixel buffers.
//!
//! Facade over the workspace crates. Most users want [`TrackedAllocator`]
//! for pixel data and the [`scoped`] functions for small per-object memory.

pub use pixmem_alloc::*;
pub use pixmem_core::{config, id, parse_size, AllocConfig, OwnerId, Reporter};
