//! Singly-linked queue of owned byte strings.
//!
//! The queue owns every element and every element owns a private,
//! NUL-terminated copy of the string it was built from. Both allocations come
//! from the queue's [`Allocator`], so a failed insertion can be unwound
//! without touching the queue.
//!
//! # Example
//!
//! ```
//! use strqueue::Queue;
//!
//! let mut queue = Queue::new();
//! queue.insert_tail("first").unwrap();
//! queue.insert_tail("second").unwrap();
//! queue.insert_head("zeroth").unwrap();
//!
//! let mut buf = [0u8; 4];
//! let copied = queue.remove_head(Some(&mut buf[..])).unwrap();
//! assert_eq!(copied, 3);
//! assert_eq!(&buf, b"zer\0");
//! assert_eq!(queue.len(), 2);
//! ```

use core::alloc::Layout;
use core::ptr::{self, NonNull};
use core::slice;

use crate::alloc::{Allocator, System};
use crate::error::{QueueError, Result};

const TERMINATOR: u8 = 0;

// Compile-time: verify u32 fits in usize
const _: () = assert!(
    size_of::<usize>() >= size_of::<u32>(),
    "Platform must have at least 32-bit addressing"
);

/// One queue entry.
///
/// `next` only orders traversal. Ownership of every element sits with the
/// [`Queue`].
#[derive(Debug)]
struct Element {
    value: NonNull<u8>,
    // Layout of `value`, terminator included. Never zero-sized.
    value_layout: Layout,
    next: Option<NonNull<Element>>,
}

impl Element {
    #[inline]
    fn value(&self) -> &[u8] {
        let len = self.value_layout.size() - 1;

        // SAFETY: value points at `value_layout.size()` initialized bytes.
        unsafe { slice::from_raw_parts(self.value.as_ptr(), len) }
    }
}

/// Bytes up to (not including) the first NUL, or the whole slice.
#[inline]
fn c_str_value(source: &[u8]) -> &[u8] {
    match source.iter().position(|&b| b == TERMINATOR) {
        Some(end) => &source[..end],
        None => source,
    }
}

/// FIFO/LIFO queue of owned strings with a cached tail for O(1) append.
///
/// Not `Send` or `Sync`: a queue has exactly one owner at a time.
#[derive(Debug)]
pub struct Queue<A: Allocator = System> {
    head: Option<NonNull<Element>>,
    tail: Option<NonNull<Element>>,
    len: u32,
    alloc: A,
}

impl Default for Queue<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue<System> {
    pub const fn new() -> Self {
        Self::new_in(System)
    }
}

impl<A: Allocator> Queue<A> {
    /// An empty queue drawing elements from `alloc`. Does not allocate.
    pub const fn new_in(alloc: A) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            alloc,
        }
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline]
    pub fn len(&self) -> u32 {
        // Invariant: len == 0 iff head/tail are None
        assert!((self.len == 0) == self.head.is_none());
        assert!((self.len == 0) == self.tail.is_none());

        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        let empty = self.head.is_none();

        assert!(empty == (self.len == 0));
        assert!(empty == self.tail.is_none());

        empty
    }

    /// Allocates a detached element holding a copy of `source`.
    ///
    /// On failure nothing allocated by this call survives.
    fn new_element(&self, source: &[u8]) -> Result<NonNull<Element>> {
        let value = c_str_value(source);

        let value_size = value.len() + 1;
        let value_layout = Layout::array::<u8>(value_size)
            .map_err(|_| QueueError::AllocFailed { size: value_size })?;
        let node_layout = Layout::new::<Element>();

        let node = self
            .alloc
            .allocate(node_layout)
            .ok_or(QueueError::AllocFailed {
                size: node_layout.size(),
            })?
            .cast::<Element>();

        let Some(payload) = self.alloc.allocate(value_layout) else {
            // SAFETY: node was just allocated with node_layout and never written.
            unsafe { self.alloc.deallocate(node.cast(), node_layout) };
            return Err(QueueError::AllocFailed { size: value_size });
        };

        // SAFETY: payload holds value_size bytes, node is sized for an Element,
        // and neither overlaps `value`.
        unsafe {
            ptr::copy_nonoverlapping(value.as_ptr(), payload.as_ptr(), value.len());
            payload.as_ptr().add(value.len()).write(TERMINATOR);

            node.write(Element {
                value: payload,
                value_layout,
                next: None,
            });
        }

        Ok(node)
    }

    /// Releases an element unlinked from the queue: payload first, then node.
    ///
    /// # Safety
    /// `node` must come from `new_element` on this queue and be unreachable.
    unsafe fn free_element(&self, node: NonNull<Element>) {
        // SAFETY: caller guarantees node is a live, initialized Element.
        let element = unsafe { node.read() };

        unsafe {
            self.alloc.deallocate(element.value, element.value_layout);
            self.alloc.deallocate(node.cast(), Layout::new::<Element>());
        }
    }

    /// Inserts a copy of `source` at the front.
    ///
    /// The value ends at the first NUL byte of `source`, if any.
    pub fn insert_head(&mut self, source: impl AsRef<[u8]>) -> Result<()> {
        let old_len = self.len;
        if old_len == u32::MAX {
            return Err(QueueError::Full);
        }

        let node = self.new_element(source.as_ref())?;

        // SAFETY: node is fresh and exclusively ours.
        unsafe { (*node.as_ptr()).next = self.head };

        match self.head {
            None => {
                // Queue was empty
                assert!(self.tail.is_none());
                assert!(self.len == 0);

                self.tail = Some(node);
            }
            Some(_) => {
                assert!(self.tail.is_some());
                assert!(self.len > 0);
            }
        }

        self.head = Some(node);
        self.len += 1;

        assert!(self.len == old_len + 1);
        assert!(self.head == Some(node));
        assert!(!self.is_empty());

        Ok(())
    }

    /// Appends a copy of `source` at the back in O(1).
    ///
    /// The value ends at the first NUL byte of `source`, if any.
    pub fn insert_tail(&mut self, source: impl AsRef<[u8]>) -> Result<()> {
        let old_len = self.len;
        if old_len == u32::MAX {
            return Err(QueueError::Full);
        }

        let node = self.new_element(source.as_ref())?;

        match self.tail {
            None => {
                // Queue was empty
                assert!(self.head.is_none());
                assert!(self.len == 0);

                self.head = Some(node);
            }
            Some(mut tail_ptr) => {
                assert!(self.head.is_some());
                assert!(self.len > 0);

                // SAFETY: tail_ptr is a live element of this queue.
                unsafe {
                    let tail = tail_ptr.as_mut();
                    assert!(tail.next.is_none(), "tail has non-null next");
                    tail.next = Some(node);
                }
            }
        }

        self.tail = Some(node);
        self.len += 1;

        assert!(self.len == old_len + 1);
        assert!(self.tail == Some(node));
        assert!(!self.is_empty());

        Ok(())
    }

    /// Removes the front element, copying its value into `buf`.
    ///
    /// At most `buf.len() - 1` bytes are copied and a NUL is always written
    /// right after them, so `buf` holds a terminated, possibly truncated,
    /// string. Bytes past the terminator are left alone. Returns the number
    /// of value bytes copied.
    ///
    /// Fails without touching the queue if it is empty, if `buf` is `None`,
    /// or if `buf` has no room for the terminator.
    pub fn remove_head(&mut self, buf: Option<&mut [u8]>) -> Result<usize> {
        let head_ptr = self.head.ok_or(QueueError::Empty)?;
        let buf = buf.ok_or(QueueError::MissingBuffer)?;
        if buf.is_empty() {
            return Err(QueueError::ZeroCapacity);
        }

        let old_len = self.len;
        assert!(old_len > 0, "head exists but len is 0");

        // SAFETY: head_ptr is a live element of this queue.
        let head = unsafe { head_ptr.as_ref() };

        let value = head.value();
        let copied = value.len().min(buf.len() - 1);
        buf[..copied].copy_from_slice(&value[..copied]);
        buf[copied] = TERMINATOR;

        self.head = head.next;

        if self.head.is_none() {
            // Queue is now empty
            assert!(self.tail == Some(head_ptr));
            self.tail = None;
        }

        self.len -= 1;

        // SAFETY: head_ptr is no longer reachable from the queue.
        unsafe { self.free_element(head_ptr) };

        assert!(self.len == old_len - 1);
        assert!(self.head.is_none() == self.tail.is_none());
        assert!(self.is_empty() == (self.len == 0));

        Ok(copied)
    }

    /// Reverses element order in place. Allocates and frees nothing.
    pub fn reverse(&mut self) {
        if self.len <= 1 {
            return;
        }

        let old_head = self.head;
        let old_tail = self.tail;

        let mut prev: Option<NonNull<Element>> = None;
        let mut current = self.head;
        let mut visited: u32 = 0;

        while let Some(mut ptr) = current {
            visited += 1;
            assert!(visited <= self.len, "cycle detected in queue");

            // SAFETY: ptr is a live element of this queue.
            let next = unsafe {
                let node = ptr.as_mut();
                let next = node.next;
                node.next = prev;
                next
            };

            prev = current;
            current = next;
        }

        assert!(visited == self.len);
        assert!(prev == old_tail);

        self.head = prev;
        self.tail = old_head;
    }

    /// Walks the chain and asserts every structural invariant.
    pub fn check_invariants(&self) {
        if self.len == 0 {
            assert!(self.head.is_none(), "len=0 but head is Some");
            assert!(self.tail.is_none(), "len=0 but tail is Some");
            return;
        }

        assert!(self.head.is_some(), "len>0 but head is None");
        assert!(self.tail.is_some(), "len>0 but tail is None");

        if self.len == 1 {
            assert!(self.head == self.tail, "len=1 but head != tail");
        }

        let mut count: u32 = 0;
        let mut current = self.head;
        let mut last: Option<NonNull<Element>> = None;

        while let Some(ptr) = current {
            count += 1;
            assert!(count <= self.len, "more nodes than len indicates");

            // SAFETY: ptr is a live element of this queue.
            unsafe {
                let node = ptr.as_ref();
                assert!(node.value_layout.size() > 0, "zero-size payload");
                assert!(
                    *node.value.as_ptr().add(node.value_layout.size() - 1) == TERMINATOR,
                    "payload not terminated"
                );
                current = node.next;
            }

            last = Some(ptr);
        }

        assert!(
            count == self.len,
            "counted {} nodes but len is {}",
            count,
            self.len
        );
        assert!(last == self.tail, "last node is not tail");
    }
}

impl<A: Allocator> Drop for Queue<A> {
    fn drop(&mut self) {
        let mut current = self.head.take();
        self.tail = None;

        let mut freed: u32 = 0;
        while let Some(ptr) = current {
            freed += 1;
            assert!(freed <= self.len, "cycle detected in queue");

            // SAFETY: ptr is a live element; read its link before freeing.
            current = unsafe { ptr.as_ref().next };
            unsafe { self.free_element(ptr) };
        }

        assert!(freed == self.len);
        self.len = 0;
    }
}
