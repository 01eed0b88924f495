//! Fault-injecting, leak-tracking allocator.
//!
//! Wraps [`System`] and records every block it hands out. Failures can be
//! scheduled by count ([`HarnessConfig::fail_after`]), by period
//! ([`HarnessConfig::fail_every`]) or one-shot ([`Harness::fail_next`]).
//!
//! # Example
//!
//! ```
//! use strqueue::{Harness, Queue};
//!
//! let harness = Harness::new();
//! {
//!     let mut queue = Queue::new_in(&harness);
//!     queue.insert_tail("a").unwrap();
//!
//!     harness.fail_next(1);
//!     assert!(queue.insert_tail("b").is_err());
//!     assert_eq!(queue.len(), 1);
//! }
//! harness.assert_no_leaks();
//! ```

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;

use crate::alloc::{Allocator, System};
use crate::env;

pub const ENV_FAIL_AFTER: &str = "STRQUEUE_FAIL_AFTER";
pub const ENV_FAIL_EVERY: &str = "STRQUEUE_FAIL_EVERY";

/// Failure schedule for a [`Harness`].
///
/// Both policies count allocation attempts since the config was applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// The first `n` attempts succeed; every later one fails.
    pub fail_after: Option<u64>,
    /// Every `k`-th attempt fails. Must be non-zero.
    pub fail_every: Option<u64>,
}

impl HarnessConfig {
    /// Reads `STRQUEUE_FAIL_AFTER` and `STRQUEUE_FAIL_EVERY`.
    ///
    /// Missing or unparsable values leave the policy disabled, as does a
    /// period of zero.
    pub fn from_env() -> Self {
        Self {
            fail_after: env::var::<u64>(ENV_FAIL_AFTER),
            fail_every: env::var::<u64>(ENV_FAIL_EVERY).filter(|&k| k > 0),
        }
    }

    /// Same rules as [`from_env`](Self::from_env), over raw values.
    pub fn from_values(fail_after: Option<&str>, fail_every: Option<&str>) -> Self {
        Self {
            fail_after: env::parse::<u64>(fail_after),
            fail_every: env::parse::<u64>(fail_every).filter(|&k| k > 0),
        }
    }

    fn should_fail(&self, attempt: u64) -> bool {
        let after = self.fail_after.is_some_and(|n| attempt >= n);
        let every = self
            .fail_every
            .is_some_and(|k| (attempt + 1).is_multiple_of(k));

        after || every
    }
}

#[derive(Debug)]
pub struct Harness {
    config: Cell<HarnessConfig>,
    attempts: Cell<u64>,
    fail_pending: Cell<u64>,
    allocations: Cell<u64>,
    deallocations: Cell<u64>,
    failures: Cell<u64>,
    live_bytes: Cell<usize>,
    // Address -> layout of every block not yet handed back.
    live: RefCell<HashMap<usize, Layout>>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// A harness that never fails on its own.
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    /// A harness scheduled by `STRQUEUE_FAIL_AFTER` / `STRQUEUE_FAIL_EVERY`.
    pub fn from_env() -> Self {
        Self::with_config(HarnessConfig::from_env())
    }

    pub fn with_config(config: HarnessConfig) -> Self {
        assert!(config.fail_every != Some(0), "fail_every must be non-zero");

        Self {
            config: Cell::new(config),
            attempts: Cell::new(0),
            fail_pending: Cell::new(0),
            allocations: Cell::new(0),
            deallocations: Cell::new(0),
            failures: Cell::new(0),
            live_bytes: Cell::new(0),
            live: RefCell::new(HashMap::new()),
        }
    }

    /// Replaces the schedule and restarts the attempt counter it runs against.
    pub fn set_config(&self, config: HarnessConfig) {
        assert!(config.fail_every != Some(0), "fail_every must be non-zero");

        self.config.set(config);
        self.attempts.set(0);
    }

    pub fn config(&self) -> HarnessConfig {
        self.config.get()
    }

    /// Fails the next `n` attempts regardless of the schedule.
    pub fn fail_next(&self, n: u64) {
        self.fail_pending.set(n);
    }

    #[inline]
    pub fn allocations(&self) -> u64 {
        self.allocations.get()
    }

    #[inline]
    pub fn deallocations(&self) -> u64 {
        self.deallocations.get()
    }

    #[inline]
    pub fn failures(&self) -> u64 {
        self.failures.get()
    }

    #[inline]
    pub fn live_blocks(&self) -> usize {
        self.live.borrow().len()
    }

    #[inline]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    /// # Panics
    /// If any block handed out by this harness is still allocated.
    pub fn assert_no_leaks(&self) {
        let blocks = self.live_blocks();
        let bytes = self.live_bytes();

        assert!(
            blocks == 0,
            "leaked {} blocks ({} bytes)",
            blocks,
            bytes
        );
        assert!(bytes == 0);
        assert!(self.allocations() == self.deallocations());
    }

    fn take_failure(&self) -> bool {
        let attempt = self.attempts.get();
        self.attempts.set(attempt + 1);

        let pending = self.fail_pending.get();
        if pending > 0 {
            self.fail_pending.set(pending - 1);
            return true;
        }

        self.config.get().should_fail(attempt)
    }
}

impl Allocator for Harness {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if self.take_failure() {
            self.failures.set(self.failures.get() + 1);
            log::debug!("harness: injected failure for {} bytes", layout.size());
            return None;
        }

        let ptr = System.allocate(layout)?;

        let prior = self.live.borrow_mut().insert(ptr.as_ptr() as usize, layout);
        assert!(prior.is_none(), "allocator returned a live block");

        self.allocations.set(self.allocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + layout.size());

        Some(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let recorded = self.live.borrow_mut().remove(&(ptr.as_ptr() as usize));

        match recorded {
            None => panic!("deallocate: block {:p} not live (double free?)", ptr),
            Some(recorded) => {
                assert!(recorded == layout, "deallocate: layout mismatch");
            }
        }

        assert!(self.live_bytes.get() >= layout.size());
        self.live_bytes.set(self.live_bytes.get() - layout.size());
        self.deallocations.set(self.deallocations.get() + 1);

        // SAFETY: the block was live in this harness, so it came from System
        // with this layout.
        unsafe { System.deallocate(ptr, layout) }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let blocks = self.live.get_mut().len();
        if blocks > 0 {
            log::warn!(
                "harness dropped with {} live blocks ({} bytes)",
                blocks,
                self.live_bytes.get()
            );
        }
    }
}
