//! The underlying byte allocator the tracked path sits on.

use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr::NonNull;

/// Allocator seam for the tracked path.
///
/// Unlike `GlobalAlloc`, failure is an ordinary `None`; the tracked allocator
/// turns it into a recoverable `OutOfMemory`.
///
/// # Safety
/// Implementations must return memory valid for `layout` (size and
/// alignment) and must accept back, through `dealloc`, any pointer they handed
/// out together with the same layout.
pub unsafe trait RawAlloc: Send + Sync + 'static {
    /// Reserve `layout.size()` bytes. `layout.size()` is never zero.
    fn try_alloc(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Same as `try_alloc`, but the returned memory is zero-filled.
    fn try_alloc_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        let ptr = self.try_alloc(layout)?;
        // SAFETY: `ptr` is valid for `layout.size()` writes.
        unsafe { ptr.as_ptr().write_bytes(0, layout.size()) };
        Some(ptr)
    }

    /// Release a block.
    ///
    /// # Safety
    /// `ptr` must come from this allocator with exactly `layout`.
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process allocator (`std::alloc::System`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAlloc;

// SAFETY: delegates to `System`, which upholds the `GlobalAlloc` contract.
unsafe impl RawAlloc for SystemAlloc {
    fn try_alloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY: callers never pass a zero-sized layout.
        NonNull::new(unsafe { System.alloc(layout) })
    }

    fn try_alloc_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY: as above.
        NonNull::new(unsafe { System.alloc_zeroed(layout) })
    }

    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees `ptr` came from `System` with `layout`.
        unsafe { System.dealloc(ptr.as_ptr(), layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_alloc_zeroed() {
        let layout = Layout::from_size_align(64, 16).unwrap();
        let ptr = SystemAlloc.try_alloc_zeroed(layout).expect("alloc");
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
        assert!(bytes.iter().all(|b| *b == 0));
        assert_eq!(ptr.as_ptr() as usize % 16, 0);
        unsafe { SystemAlloc.dealloc(ptr, layout) };
    }
}
