//! The live account of tracked memory.
//!
//! One mutex guards all three counters so they move together. Counters are
//! signed: an over-free shows up as a negative value instead of wrapping.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
struct Counters {
    live_allocations: i64,
    current_bytes: i64,
    high_water_bytes: i64,
}

impl Counters {
    fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            live_allocations: self.live_allocations,
            current_bytes: self.current_bytes,
            high_water_bytes: self.high_water_bytes,
        }
    }
}

/// A point-in-time copy of an [`Account`], taken under its lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub live_allocations: i64,
    pub current_bytes: i64,
    pub high_water_bytes: i64,
}

impl AccountSnapshot {
    /// True if outstanding tracked memory is above `limit` bytes.
    pub fn exceeds(&self, limit: usize) -> bool {
        self.current_bytes > to_signed(limit)
    }
}

/// Accounting mistakes detected on the free path. Reported, never corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inconsistency {
    /// A free arrived while no allocations were live.
    TooManyFrees,
    /// A free took `current_bytes` below zero.
    TooMuchFree,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::TooManyFrees => f.write_str("too many frees"),
            Inconsistency::TooMuchFree => f.write_str("too much free"),
        }
    }
}

/// What a single free did to the account.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FreeRecord {
    pub(crate) after: AccountSnapshot,
    too_many_frees: bool,
    too_much_free: bool,
}

impl FreeRecord {
    pub(crate) fn inconsistencies(&self) -> impl Iterator<Item = Inconsistency> {
        let many = self.too_many_frees.then_some(Inconsistency::TooManyFrees);
        let much = self.too_much_free.then_some(Inconsistency::TooMuchFree);
        many.into_iter().chain(much)
    }
}

/// Outstanding tracked memory: live allocation count, current bytes and the
/// high-water mark.
#[derive(Debug, Default)]
pub struct Account {
    counters: Mutex<Counters>,
}

impl Account {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Plain integers: a panic elsewhere cannot leave them half-written.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a new live block of `bytes` (header included).
    pub(crate) fn record_alloc(&self, bytes: usize) -> AccountSnapshot {
        let mut c = self.lock();
        c.live_allocations = c.live_allocations.saturating_add(1);
        c.current_bytes = c.current_bytes.saturating_add(to_signed(bytes));
        if c.current_bytes > c.high_water_bytes {
            c.high_water_bytes = c.current_bytes;
        }
        c.snapshot()
    }

    /// Remove a block of `bytes` (header included) from the account.
    pub(crate) fn record_free(&self, bytes: usize) -> FreeRecord {
        let mut c = self.lock();
        let too_many_frees = c.live_allocations <= 0;
        c.current_bytes = c.current_bytes.saturating_sub(to_signed(bytes));
        let too_much_free = c.current_bytes < 0;
        c.live_allocations = c.live_allocations.saturating_sub(1);
        FreeRecord {
            after: c.snapshot(),
            too_many_frees,
            too_much_free,
        }
    }

    pub fn live_allocations(&self) -> i64 {
        self.lock().live_allocations
    }

    pub fn current_bytes(&self) -> i64 {
        self.lock().current_bytes
    }

    pub fn high_water(&self) -> i64 {
        self.lock().high_water_bytes
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.lock().snapshot()
    }
}

fn to_signed(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}
