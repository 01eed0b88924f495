//! Flat operation set with absent-reference semantics.
//!
//! Mirrors the lab's C entry points: every queue argument may be `None`, and
//! results collapse to `bool`/`Option`. Use [`Queue`] directly for typed
//! errors.
//!
//! ```
//! use strqueue::api;
//!
//! let mut queue = api::create().unwrap();
//! assert!(api::insert_tail(Some(&mut *queue), "a"));
//! assert!(api::insert_head(Some(&mut *queue), "b"));
//! assert_eq!(api::size(Some(&*queue)), 2);
//!
//! let mut buf = [0u8; 8];
//! assert!(api::remove_head(Some(&mut *queue), Some(&mut buf[..])));
//! assert_eq!(&buf[..2], b"b\0");
//!
//! api::destroy(Some(queue));
//! assert_eq!(api::size::<strqueue::System>(None), 0);
//! ```

use core::alloc::Layout;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use crate::alloc::{Allocator, System};
use crate::queue::Queue;

/// A [`Queue`] whose own storage also comes from its allocator.
///
/// Dropping it releases every element, then the queue storage.
#[derive(Debug)]
pub struct QueueBox<A: Allocator + Clone = System> {
    ptr: NonNull<Queue<A>>,
}

impl<A: Allocator + Clone> QueueBox<A> {
    /// Returns `None` if the queue storage cannot be allocated.
    pub fn try_new_in(alloc: A) -> Option<Self> {
        let layout = Layout::new::<Queue<A>>();
        let ptr = alloc.allocate(layout)?.cast::<Queue<A>>();

        // SAFETY: ptr is sized and aligned for Queue<A>.
        unsafe { ptr.write(Queue::new_in(alloc)) };

        Some(Self { ptr })
    }
}

impl<A: Allocator + Clone> Deref for QueueBox<A> {
    type Target = Queue<A>;

    fn deref(&self) -> &Queue<A> {
        // SAFETY: ptr is initialized for our whole lifetime.
        unsafe { self.ptr.as_ref() }
    }
}

impl<A: Allocator + Clone> DerefMut for QueueBox<A> {
    fn deref_mut(&mut self) -> &mut Queue<A> {
        // SAFETY: ptr is initialized and uniquely owned.
        unsafe { self.ptr.as_mut() }
    }
}

impl<A: Allocator + Clone> Drop for QueueBox<A> {
    fn drop(&mut self) {
        let alloc = self.allocator().clone();

        // SAFETY: ptr came from `alloc` with this layout and is dropped once.
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            alloc.deallocate(self.ptr.cast(), Layout::new::<Queue<A>>());
        }
    }
}

pub fn create() -> Option<QueueBox<System>> {
    QueueBox::try_new_in(System)
}

pub fn create_in<A: Allocator + Clone>(alloc: A) -> Option<QueueBox<A>> {
    QueueBox::try_new_in(alloc)
}

/// No-op for `None`.
pub fn destroy<A: Allocator + Clone>(queue: Option<QueueBox<A>>) {
    drop(queue);
}

pub fn insert_head<A: Allocator>(
    queue: Option<&mut Queue<A>>,
    source: impl AsRef<[u8]>,
) -> bool {
    queue.is_some_and(|q| q.insert_head(source).is_ok())
}

pub fn insert_tail<A: Allocator>(
    queue: Option<&mut Queue<A>>,
    source: impl AsRef<[u8]>,
) -> bool {
    queue.is_some_and(|q| q.insert_tail(source).is_ok())
}

/// On success `buf` holds the removed value, truncated to `buf.len() - 1`
/// bytes and NUL-terminated.
pub fn remove_head<A: Allocator>(
    queue: Option<&mut Queue<A>>,
    buf: Option<&mut [u8]>,
) -> bool {
    queue.is_some_and(|q| q.remove_head(buf).is_ok())
}

/// Zero for `None`.
pub fn size<A: Allocator>(queue: Option<&Queue<A>>) -> u32 {
    queue.map_or(0, Queue::len)
}

pub fn reverse<A: Allocator>(queue: Option<&mut Queue<A>>) {
    if let Some(queue) = queue {
        queue.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::Harness;

    #[test]
    fn absent_queue_is_tolerated() {
        let mut buf = [0u8; 4];

        assert!(!insert_head::<System>(None, "a"));
        assert!(!insert_tail::<System>(None, "a"));
        assert!(!remove_head::<System>(None, Some(&mut buf[..])));
        assert_eq!(size::<System>(None), 0);
        reverse::<System>(None);
        destroy::<System>(None);
    }

    #[test]
    fn create_then_destroy() {
        let queue = create().unwrap();
        assert_eq!(size(Some(&*queue)), 0);
        destroy(Some(queue));
    }

    #[test]
    fn reverse_fresh_queue() {
        let mut queue = create().unwrap();
        reverse(Some(&mut *queue));
        assert_eq!(size(Some(&*queue)), 0);
    }

    #[test]
    fn create_fails_under_harness() {
        let harness = Harness::new();
        harness.fail_next(1);

        assert!(create_in(&harness).is_none());
        harness.assert_no_leaks();
    }

    #[test]
    fn destroy_releases_queue_storage() {
        let harness = Harness::new();

        let mut queue = create_in(&harness).unwrap();
        assert_eq!(harness.live_blocks(), 1);

        for value in ["x", "y", "z"] {
            assert!(insert_tail(Some(&mut *queue), value));
        }
        assert_eq!(harness.live_blocks(), 7);

        destroy(Some(queue));
        harness.assert_no_leaks();
    }

    #[test]
    fn remove_head_failures_keep_size() {
        let mut queue = create().unwrap();
        let mut buf = [0u8; 4];

        assert!(!remove_head(Some(&mut *queue), Some(&mut buf[..])));
        assert!(insert_tail(Some(&mut *queue), "a"));
        assert!(!remove_head(Some(&mut *queue), None));
        assert_eq!(size(Some(&*queue)), 1);
    }

    #[test]
    fn insert_failure_reports_false() {
        let harness = Harness::new();
        let mut queue = create_in(&harness).unwrap();

        harness.fail_next(1);
        assert!(!insert_head(Some(&mut *queue), "a"));
        assert_eq!(size(Some(&*queue)), 0);

        destroy(Some(queue));
        harness.assert_no_leaks();
    }
}
