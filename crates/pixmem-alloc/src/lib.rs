#![deny(unsafe_op_in_unsafe_fn)]
//! pixmem-alloc: tracked, plain, and lifecycle-scoped allocators.
//!
//! The tracked allocator is the one that matters for memory pressure: every
//! block carries a size header and is counted against an [`Account`], which
//! the host polls to decide when to trim caches. The plain and scoped paths
//! are untracked conveniences; the scoped path ties memory to a
//! [`LifecycleOwner`] and releases it at teardown.
//!
//! ```
//! use pixmem_alloc::{LifecycleOwner, TrackedAllocator, HEADER_WIDTH};
//!
//! let alloc = TrackedAllocator::new();
//! let buf = alloc.alloc_buf(1024).unwrap();
//! assert_eq!(alloc.current_bytes(), (1024 + HEADER_WIDTH) as i64);
//! drop(buf);
//! assert_eq!(alloc.live_allocations(), 0);
//!
//! let owner = LifecycleOwner::named("tile");
//! let tile = alloc.alloc_in(&owner, 256).unwrap();
//! tile[0] = 255;
//! owner.close();
//! assert_eq!(alloc.current_bytes(), 0);
//! ```

pub mod account;
pub mod error;
pub mod lifecycle;
pub mod plain;
pub mod raw;
pub mod report;
pub mod scoped;
pub mod tracked;

pub use account::{Account, AccountSnapshot, Inconsistency};
pub use error::{Error, Result};
pub use lifecycle::{LifecycleOwner, TeardownFn, TeardownReport};
pub use plain::PlainBuf;
pub use raw::{RawAlloc, SystemAlloc};
pub use report::{CollectingReporter, Report, TracingReporter};
pub use scoped::{ScopedBuf, ScopedStr};
pub use tracked::{TrackedAllocator, TrackedBuf, BLOCK_ALIGN, HEADER_WIDTH};
