//! Untracked pass-through allocations.
//!
//! Nothing here touches an account. Exhaustion follows the standard library
//! convention (`handle_alloc_error`), so these calls never return an error for
//! lack of memory. Use the tracked allocator for large pixel buffers.

use std::ffi::{CStr, CString};
use std::ops::{Deref, DerefMut};

use crate::error::Result;

/// Owned, zero-filled, untracked bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainBuf {
    buf: Box<[u8]>,
}

impl PlainBuf {
    pub fn into_boxed_slice(self) -> Box<[u8]> {
        self.buf
    }
}

impl From<Box<[u8]>> for PlainBuf {
    fn from(buf: Box<[u8]>) -> Self {
        Self { buf }
    }
}

impl Deref for PlainBuf {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PlainBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

/// `size` zeroed bytes.
pub fn alloc(size: usize) -> PlainBuf {
    PlainBuf {
        buf: vec![0u8; size].into_boxed_slice(),
    }
}

/// `n` default-initialized values of `T`.
///
/// The typed counterpart of [`alloc`] for host code that allocates arrays of
/// structs (the host's `NEW`/`ARRAY` helpers) rather than raw bytes.
pub fn alloc_array<T: Default>(n: usize) -> Box<[T]> {
    (0..n).map(|_| T::default()).collect()
}

/// Copy `text`, NUL terminator included.
pub fn strdup(text: &CStr) -> CString {
    text.to_owned()
}

/// Release anything obtained from this module or from the scoped allocator.
///
/// Always succeeds. The `Result` return matches the teardown-callback shape,
/// so this can be registered on an owner directly.
pub fn free<T>(value: T) -> Result<()> {
    drop(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed() {
        let mut buf = alloc(128);
        assert_eq!(buf.len(), 128);
        assert!(buf.iter().all(|b| *b == 0));
        buf[5] = 9;
        assert_eq!(buf.into_boxed_slice()[5], 9);
    }

    #[test]
    fn test_alloc_array_defaults() {
        let arr: Box<[u32]> = alloc_array(4);
        assert_eq!(&*arr, &[0, 0, 0, 0]);
    }

    #[test]
    fn test_strdup_keeps_terminator() {
        let copy = strdup(c"band");
        assert_eq!(copy.as_bytes_with_nul(), b"band\0");
    }

    #[test]
    fn test_free_always_ok() {
        assert!(free(alloc(16)).is_ok());
        assert!(free(strdup(c"x")).is_ok());
    }
}
