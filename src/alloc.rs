//! Allocation seam for queue nodes and payloads.
//!
//! Every byte the queue owns goes through an [`Allocator`], so tests can swap
//! in the [`Harness`](crate::harness::Harness) to inject failures and count
//! live blocks.

use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

/// Fallible raw allocator.
///
/// Unlike `std::alloc::GlobalAlloc`, failure is reported as `None` and the
/// caller decides what to do. Layouts passed in are never zero-sized.
pub trait Allocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must have come from `allocate` on this allocator with the same
    /// `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// The process-wide allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

impl Allocator for System {
    #[inline]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        assert!(layout.size() > 0, "zero-size allocation");

        // SAFETY: layout has non-zero size.
        NonNull::new(unsafe { alloc(layout) })
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees ptr/layout came from `allocate`.
        unsafe { dealloc(ptr.as_ptr(), layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_roundtrip() {
        let layout = Layout::array::<u8>(16).unwrap();
        let ptr = System.allocate(layout).unwrap();

        unsafe {
            ptr.as_ptr().write_bytes(0xAB, 16);
            assert_eq!(*ptr.as_ptr().add(15), 0xAB);
            System.deallocate(ptr, layout);
        }
    }

    #[test]
    fn reference_forwards() {
        let sys = System;
        let by_ref: &System = &sys;
        let layout = Layout::new::<u64>();

        let ptr = by_ref.allocate(layout).unwrap();
        assert!(ptr.as_ptr() as usize % layout.align() == 0);
        unsafe { by_ref.deallocate(ptr, layout) };
    }

    #[test]
    #[should_panic(expected = "zero-size allocation")]
    fn panic_zero_size() {
        let _ = System.allocate(Layout::from_size_align(0, 1).unwrap());
    }
}
