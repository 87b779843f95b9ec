//! Size-prefixed tracked allocations.
//!
//! Block layout:
//! [ total size: usize, padded to HEADER_WIDTH ][ payload … ]
//!
//! Callers get a pointer to the payload. `free` steps back over the header to
//! recover the total, which is both the amount to take off the account and
//! the size of the `Layout` to release.
//!
//! All large pixel buffers should come from here so the host can see how much
//! of this memory is outstanding.

use std::alloc::Layout;
use std::fmt;
use std::mem::{align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use once_cell::sync::Lazy;
use pixmem_core::config::AllocConfig;
use pixmem_core::report::Reporter;

use crate::account::{Account, AccountSnapshot};
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleOwner, OwnedPtr};
use crate::raw::{RawAlloc, SystemAlloc};
use crate::report::TracingReporter;

/// Bytes in front of every payload.
pub const HEADER_WIDTH: usize = 16;

/// Alignment of every block, and therefore of every payload.
pub const BLOCK_ALIGN: usize = 16;

/// Reporter domain for tracked-path diagnostics.
pub const DOMAIN: &str = "pixmem_tracked";

const _: () = assert!(HEADER_WIDTH >= size_of::<usize>());
const _: () = assert!(BLOCK_ALIGN >= align_of::<usize>());
const _: () = assert!(HEADER_WIDTH % BLOCK_ALIGN == 0);

static GLOBAL: Lazy<TrackedAllocator> =
    Lazy::new(|| TrackedAllocator::with_config(AllocConfig::from_env()));

struct TrackedInner<A> {
    raw: A,
    account: Arc<Account>,
    reporter: Arc<dyn Reporter>,
    config: AllocConfig,
}

/// Allocator that counts every block against an [`Account`].
///
/// Cloning is cheap and clones share the account.
pub struct TrackedAllocator<A: RawAlloc = SystemAlloc> {
    inner: Arc<TrackedInner<A>>,
}

impl<A: RawAlloc> Clone for TrackedAllocator<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl TrackedAllocator<SystemAlloc> {
    /// A fresh account over the system allocator, logging through `tracing`.
    pub fn new() -> Self {
        Self::with_config(AllocConfig::default())
    }

    pub fn with_config(config: AllocConfig) -> Self {
        Self::with_parts(
            SystemAlloc,
            Arc::new(Account::new()),
            Arc::new(TracingReporter),
            config,
        )
    }

    /// The process-wide allocator. Built on first use, exactly once, with
    /// configuration read from the environment.
    pub fn global() -> &'static TrackedAllocator {
        &GLOBAL
    }
}

impl Default for TrackedAllocator<SystemAlloc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: RawAlloc> TrackedAllocator<A> {
    pub fn with_parts(
        raw: A,
        account: Arc<Account>,
        reporter: Arc<dyn Reporter>,
        config: AllocConfig,
    ) -> Self {
        Self {
            inner: Arc::new(TrackedInner {
                raw,
                account,
                reporter,
                config,
            }),
        }
    }

    /// Reserve `size` payload bytes. The payload is uninitialized.
    ///
    /// Release with [`free`](Self::free).
    pub fn alloc(&self, size: usize) -> Result<NonNull<u8>> {
        self.reserve(size, false)
    }

    /// Like [`alloc`](Self::alloc), with a zero-filled payload.
    pub fn alloc_zeroed(&self, size: usize) -> Result<NonNull<u8>> {
        self.reserve(size, true)
    }

    fn reserve(&self, size: usize, zeroed: bool) -> Result<NonNull<u8>> {
        if size == 0 {
            return Err(Error::InvalidSize { size });
        }
        let total = size.saturating_add(HEADER_WIDTH);
        let layout = match Layout::from_size_align(total, BLOCK_ALIGN) {
            Ok(layout) => layout,
            Err(_) => return Err(self.out_of_memory(total)),
        };

        let reserved = if zeroed {
            self.inner.raw.try_alloc_zeroed(layout)
        } else {
            self.inner.raw.try_alloc(layout)
        };
        let Some(base) = reserved else {
            return Err(self.out_of_memory(total));
        };

        // SAFETY: `base` is BLOCK_ALIGN-aligned and valid for `total` bytes,
        // and `total > HEADER_WIDTH >= size_of::<usize>()`.
        let payload = unsafe {
            base.as_ptr().cast::<usize>().write(total);
            NonNull::new_unchecked(base.as_ptr().add(HEADER_WIDTH))
        };

        let _after = self.inner.account.record_alloc(total);
        #[cfg(feature = "trace-allocs")]
        tracing::trace!(
            size,
            total,
            current = _after.current_bytes,
            live = _after.live_allocations,
            "tracked alloc"
        );

        Ok(payload)
    }

    fn out_of_memory(&self, total: usize) -> Error {
        let err = Error::OutOfMemory { size: total };
        if self.inner.config.abort_on_oom {
            panic!("{err}");
        }
        if self.inner.config.warn_on_oom {
            self.inner.reporter.warn(DOMAIN, &err.to_string());
        }
        err
    }

    /// Release a block and take it off the account.
    ///
    /// Over-frees are reported as warnings and the counters keep whatever
    /// value the arithmetic produced.
    ///
    /// # Safety
    /// `ptr` must have come from [`alloc`](Self::alloc) or
    /// [`alloc_zeroed`](Self::alloc_zeroed) on a tracked allocator backed by
    /// the same kind of raw allocator, and must not have been freed already.
    /// Any other pointer makes the header read garbage.
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        // SAFETY: per the contract, `ptr` sits HEADER_WIDTH past an aligned
        // block base whose first word holds the block's total size.
        let (base, total) = unsafe {
            let base = ptr.as_ptr().sub(HEADER_WIDTH);
            (base, base.cast::<usize>().read())
        };

        let record = self.inner.account.record_free(total);
        for issue in record.inconsistencies() {
            self.inner.reporter.warn(
                DOMAIN,
                &format!(
                    "tracked free: {issue} (live {}, bytes {})",
                    record.after.live_allocations, record.after.current_bytes
                ),
            );
        }
        #[cfg(feature = "trace-allocs")]
        tracing::trace!(
            total,
            current = record.after.current_bytes,
            live = record.after.live_allocations,
            "tracked free"
        );

        // SAFETY: `reserve` built this block's layout from the same total and
        // alignment, and the raw allocator handed out `base`.
        unsafe {
            let layout = Layout::from_size_align_unchecked(total, BLOCK_ALIGN);
            self.inner.raw.dealloc(NonNull::new_unchecked(base), layout);
        }
    }

    /// A zero-filled buffer that frees itself through the tracked path on drop.
    pub fn alloc_buf(&self, size: usize) -> Result<TrackedBuf<A>> {
        let ptr = self.alloc_zeroed(size)?;
        Ok(TrackedBuf {
            alloc: self.clone(),
            ptr,
            len: size,
        })
    }

    /// A zero-filled buffer released when `owner` tears down.
    pub fn alloc_in<'o>(&self, owner: &'o LifecycleOwner, size: usize) -> Result<&'o mut [u8]> {
        let ptr = self.alloc_zeroed(size)?;
        let alloc = self.clone();
        let block = OwnedPtr::new(ptr);
        owner.on_teardown(move |_| {
            // SAFETY: this callback runs once, and the block came from `alloc`.
            unsafe { alloc.free(block.into_inner()) };
            Ok(())
        });
        // SAFETY: `size` zeroed bytes, freed only at teardown, which cannot
        // happen while `owner` is borrowed for 'o.
        Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), size) })
    }

    /// Tracked bytes outstanding, headers included.
    pub fn current_bytes(&self) -> i64 {
        self.inner.account.current_bytes()
    }

    /// Largest `current_bytes` ever seen on this account.
    pub fn high_water(&self) -> i64 {
        self.inner.account.high_water()
    }

    pub fn live_allocations(&self) -> i64 {
        self.inner.account.live_allocations()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.inner.account.snapshot()
    }

    /// True when a tracked-memory limit is configured and exceeded. Hosts use
    /// this to decide when to trim caches.
    pub fn over_limit(&self) -> bool {
        match self.inner.config.tracked_mem_limit {
            Some(limit) => self.snapshot().exceeds(limit),
            None => false,
        }
    }

    pub fn account(&self) -> &Arc<Account> {
        &self.inner.account
    }

    pub fn config(&self) -> &AllocConfig {
        &self.inner.config
    }
}

impl<A: RawAlloc> fmt::Debug for TrackedAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedAllocator")
            .field("account", &self.snapshot())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Owned, zero-filled tracked memory. Dropping it frees the block.
pub struct TrackedBuf<A: RawAlloc = SystemAlloc> {
    alloc: TrackedAllocator<A>,
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the buffer uniquely owns its block, like `Vec<u8>`.
unsafe impl<A: RawAlloc> Send for TrackedBuf<A> {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl<A: RawAlloc> Sync for TrackedBuf<A> {}

impl<A: RawAlloc> TrackedBuf<A> {
    /// Bytes this buffer holds on the account, header included.
    pub fn reserved_bytes(&self) -> usize {
        self.len + HEADER_WIDTH
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl<A: RawAlloc> Deref for TrackedBuf<A> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        // SAFETY: `len` initialized (zeroed) bytes owned by this buffer.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<A: RawAlloc> DerefMut for TrackedBuf<A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: as above, and `&mut self` makes the access unique.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<A: RawAlloc> Drop for TrackedBuf<A> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `self.alloc` and is freed only here.
        unsafe { self.alloc.free(self.ptr) };
    }
}

impl<A: RawAlloc> fmt::Debug for TrackedBuf<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedBuf").field("len", &self.len).finish()
    }
}
