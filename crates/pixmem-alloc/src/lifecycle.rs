//! Teardown registry for lifecycle-scoped allocations.
//!
//! A [`LifecycleOwner`] collects release callbacks and runs each exactly once
//! when it tears down, either through [`LifecycleOwner::close`] or on drop.
//! Callbacks run in registration order.
//!
//! Scoped allocations borrow the owner, so the borrow checker guarantees no
//! scoped buffer outlives the teardown that frees it.

use std::fmt;
use std::ptr::NonNull;
use std::sync::{Mutex, PoisonError};

use pixmem_core::id::OwnerId;

use crate::error::Result;

/// A release callback. Receives the id of the owner being torn down.
pub type TeardownFn = Box<dyn FnOnce(OwnerId) -> Result<()> + Send>;

/// Outcome of a teardown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    /// Callbacks invoked.
    pub ran: usize,
    /// Callbacks that returned an error. They still count as run.
    pub failed: usize,
}

pub struct LifecycleOwner {
    id: OwnerId,
    name: Option<String>,
    hooks: Mutex<Vec<TeardownFn>>,
}

impl LifecycleOwner {
    pub fn new() -> Self {
        Self {
            id: OwnerId::next(),
            name: None,
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// An owner with a name for diagnostics.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: OwnerId::next(),
            name: Some(name.into()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Register `f` to run once at teardown.
    pub fn on_teardown<F>(&self, f: F)
    where
        F: FnOnce(OwnerId) -> Result<()> + Send + 'static,
    {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(f));
    }

    /// Callbacks waiting for teardown.
    pub fn pending(&self) -> usize {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Tear down now and report what ran.
    pub fn close(mut self) -> TeardownReport {
        self.teardown()
    }

    fn teardown(&mut self) -> TeardownReport {
        let hooks = std::mem::take(self.hooks.get_mut().unwrap_or_else(PoisonError::into_inner));
        let mut report = TeardownReport::default();
        if hooks.is_empty() {
            return report;
        }

        for hook in hooks {
            report.ran += 1;
            if let Err(e) = hook(self.id) {
                report.failed += 1;
                tracing::warn!(owner = %self.id, name = ?self.name, error = %e, "teardown callback failed");
            }
        }

        tracing::debug!(
            owner = %self.id,
            name = ?self.name,
            ran = report.ran,
            failed = report.failed,
            "owner torn down"
        );
        report
    }
}

/// A block pointer moved into a teardown callback.
///
/// The callback is the block's sole owner until it runs, so sending the
/// pointer to whichever thread tears the owner down is fine.
pub(crate) struct OwnedPtr<T: ?Sized>(NonNull<T>);

// SAFETY: see above; nothing else touches the block after registration except
// through the borrow handed to the caller, which ends before teardown.
unsafe impl<T: ?Sized> Send for OwnedPtr<T> {}

impl<T: ?Sized> OwnedPtr<T> {
    pub(crate) fn new(ptr: NonNull<T>) -> Self {
        Self(ptr)
    }

    pub(crate) fn into_inner(self) -> NonNull<T> {
        self.0
    }
}

impl Default for LifecycleOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LifecycleOwner {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for LifecycleOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOwner")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_callbacks_run_once_in_order() {
        let owner = LifecycleOwner::named("image");
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            owner.on_teardown(move |_| {
                order.lock().unwrap().push(i);
                Ok(())
            });
        }
        assert_eq!(owner.pending(), 3);

        let report = owner.close();
        assert_eq!(report, TeardownReport { ran: 3, failed: 0 });
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_drop_runs_teardown() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let owner = LifecycleOwner::new();
            let hits = Arc::clone(&hits);
            owner.on_teardown(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_callback_does_not_stop_teardown() {
        let owner = LifecycleOwner::new();
        let hits = Arc::new(AtomicUsize::new(0));
        owner.on_teardown(|_| Err(Error::Teardown("boom".into())));
        let h = Arc::clone(&hits);
        owner.on_teardown(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = owner.close();
        assert_eq!(report, TeardownReport { ran: 2, failed: 1 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_named_owner_starts_empty() {
        let a = LifecycleOwner::named("band");
        let b = LifecycleOwner::named("band");
        assert_eq!(a.name(), Some("band"));
        assert_eq!(a.pending(), 0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.close(), TeardownReport::default());
    }

    #[test]
    fn test_callback_receives_owner_id() {
        let owner = LifecycleOwner::new();
        let expected = owner.id();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        owner.on_teardown(move |id| {
            *s.lock().unwrap() = Some(id);
            Ok(())
        });
        drop(owner);
        assert_eq!(*seen.lock().unwrap(), Some(expected));
    }
}
