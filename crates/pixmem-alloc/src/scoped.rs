//! Plain allocations bound to a [`LifecycleOwner`].
//!
//! With an owner, the memory is handed to the owner's teardown and the caller
//! gets a borrow that cannot outlive it. Without one, the caller gets an owned
//! value and releases it by dropping it or passing it to [`free`].

use std::ffi::{CStr, CString};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::lifecycle::{LifecycleOwner, OwnedPtr};
use crate::plain::{self, PlainBuf};

pub use crate::plain::free;

/// Bytes from [`malloc`].
#[derive(Debug)]
pub enum ScopedBuf<'o> {
    /// No owner: the caller releases it.
    Owned(PlainBuf),
    /// Released when the owner tears down.
    Borrowed(&'o mut [u8]),
}

impl ScopedBuf<'_> {
    pub fn is_owned(&self) -> bool {
        matches!(self, ScopedBuf::Owned(_))
    }

    /// The owned buffer, if no owner holds it.
    pub fn into_owned(self) -> Option<PlainBuf> {
        match self {
            ScopedBuf::Owned(buf) => Some(buf),
            ScopedBuf::Borrowed(_) => None,
        }
    }
}

impl Deref for ScopedBuf<'_> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        match self {
            ScopedBuf::Owned(buf) => buf,
            ScopedBuf::Borrowed(buf) => buf,
        }
    }
}

impl DerefMut for ScopedBuf<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            ScopedBuf::Owned(buf) => buf,
            ScopedBuf::Borrowed(buf) => buf,
        }
    }
}

/// A string from [`strdup`].
#[derive(Debug)]
pub enum ScopedStr<'o> {
    Owned(CString),
    Borrowed(&'o CStr),
}

impl ScopedStr<'_> {
    pub fn is_owned(&self) -> bool {
        matches!(self, ScopedStr::Owned(_))
    }

    pub fn into_owned(self) -> Option<CString> {
        match self {
            ScopedStr::Owned(s) => Some(s),
            ScopedStr::Borrowed(_) => None,
        }
    }
}

impl Deref for ScopedStr<'_> {
    type Target = CStr;
    fn deref(&self) -> &Self::Target {
        match self {
            ScopedStr::Owned(s) => s,
            ScopedStr::Borrowed(s) => s,
        }
    }
}

/// `size` zeroed, untracked bytes, released at `owner` teardown if given.
pub fn malloc(owner: Option<&LifecycleOwner>, size: usize) -> ScopedBuf<'_> {
    let buf = plain::alloc(size);
    match owner {
        None => ScopedBuf::Owned(buf),
        Some(owner) => ScopedBuf::Borrowed(attach(owner, buf.into_boxed_slice())),
    }
}

/// Copy `text` (terminator included), released at `owner` teardown if given.
pub fn strdup<'o>(owner: Option<&'o LifecycleOwner>, text: &CStr) -> ScopedStr<'o> {
    let copy = plain::strdup(text);
    match owner {
        None => ScopedStr::Owned(copy),
        Some(owner) => ScopedStr::Borrowed(attach(owner, copy.into_boxed_c_str())),
    }
}

/// Hand `value` to `owner`'s teardown and borrow it for the owner's lifetime.
fn attach<'o, T>(owner: &'o LifecycleOwner, value: Box<T>) -> &'o mut T
where
    T: ?Sized + Send + 'static,
{
    let ptr = NonNull::from(Box::leak(value));
    let held = OwnedPtr::new(ptr);
    owner.on_teardown(move |_| {
        // SAFETY: leaked above and reclaimed exactly once, here.
        free(unsafe { Box::from_raw(held.into_inner().as_ptr()) })
    });
    // SAFETY: the box stays alive until teardown, which needs the owner by
    // value and so cannot run while it is borrowed for 'o.
    unsafe { &mut *ptr.as_ptr() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountDrops(Arc<AtomicUsize>);

    impl Drop for CountDrops {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_malloc_without_owner_is_owned() {
        let buf = malloc(None, 32);
        assert!(buf.is_owned());
        assert_eq!(buf.len(), 32);
        let owned = buf.into_owned().unwrap();
        assert!(free(owned).is_ok());
    }

    #[test]
    fn test_malloc_with_owner_registers_release() {
        let owner = LifecycleOwner::new();
        {
            let mut buf = malloc(Some(&owner), 16);
            assert!(!buf.is_owned());
            buf[15] = 3;
            assert_eq!(buf[15], 3);
        }
        assert_eq!(owner.pending(), 1);
        assert_eq!(owner.close().ran, 1);
    }

    #[test]
    fn test_strdup_with_and_without_owner() {
        let owner = LifecycleOwner::named("meta");
        let held = strdup(Some(&owner), c"xres");
        assert_eq!(held.to_bytes_with_nul(), b"xres\0");
        assert!(held.into_owned().is_none());

        let mine = strdup(None, c"yres");
        assert!(mine.is_owned());
        assert_eq!(mine.to_str().unwrap(), "yres");
        assert_eq!(owner.pending(), 1);
    }

    #[test]
    fn test_attached_value_dropped_exactly_once_at_teardown() {
        let drops = Arc::new(AtomicUsize::new(0));
        let owner = LifecycleOwner::new();
        attach(&owner, Box::new(CountDrops(Arc::clone(&drops))));
        attach(&owner, Box::new(CountDrops(Arc::clone(&drops))));
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(owner);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }
}
