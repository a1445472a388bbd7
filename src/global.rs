//! Locked wrapper for concurrent use.
//!
//! The core allocator is single-threaded by design: two racing allocations
//! could both pick the same free block before either removes it from the
//! list. [`LockedAllocator`] puts a mutex around the three entry points
//! without touching the algorithm, and implements [`GlobalAlloc`] so the
//! allocator can back a `#[global_allocator]` static.

use core::alloc::{GlobalAlloc, Layout};

use spin::Mutex;

use crate::block::DSIZE;
use crate::explicit::ExplicitAllocator;
use crate::source::{MemorySource, Sbrk};

/// Mutual-exclusion boundary around an [`ExplicitAllocator`].
pub struct LockedAllocator<S: MemorySource = Sbrk> {
  inner: Mutex<ExplicitAllocator<S>>,
}

impl LockedAllocator<Sbrk> {
  /// A locked allocator over the process program break.
  ///
  /// ```rust,ignore
  /// use exalloc::LockedAllocator;
  ///
  /// #[global_allocator]
  /// static HEAP: LockedAllocator = LockedAllocator::new();
  /// ```
  pub const fn new() -> Self {
    Self::with_source(Sbrk)
  }
}

impl<S: MemorySource> LockedAllocator<S> {
  /// A locked allocator over the given memory source.
  pub const fn with_source(source: S) -> Self {
    Self {
      inner: Mutex::new(ExplicitAllocator::with_source(source)),
    }
  }
}

unsafe impl<S: MemorySource> GlobalAlloc for LockedAllocator<S> {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    // Payloads are double-word aligned and no more.
    if layout.align() > DSIZE {
      return core::ptr::null_mut();
    }

    unsafe { self.inner.lock().allocate(layout.size()) }
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.inner.lock().free(ptr) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > DSIZE {
      return core::ptr::null_mut();
    }

    unsafe { self.inner.lock().resize(ptr, new_size) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::FixedRegion;

  #[test]
  fn test_global_alloc_round_trip() {
    let allocator = LockedAllocator::with_source(FixedRegion::new(1 << 16));

    unsafe {
      let layout = Layout::new::<u64>();
      let ptr = allocator.alloc(layout);

      assert!(!ptr.is_null());
      assert_eq!(ptr as usize % DSIZE, 0);

      (ptr as *mut u64).write(0xDEAD_BEEF);
      assert_eq!((ptr as *mut u64).read(), 0xDEAD_BEEF);

      allocator.dealloc(ptr, layout);
    }
  }

  #[test]
  fn test_realloc_preserves_contents() {
    let allocator = LockedAllocator::with_source(FixedRegion::new(1 << 16));

    unsafe {
      let layout = Layout::array::<u8>(16).unwrap();
      let ptr = allocator.alloc(layout);
      assert!(!ptr.is_null());

      for i in 0..16 {
        ptr.add(i).write(i as u8);
      }

      let grown = allocator.realloc(ptr, layout, 256);
      assert!(!grown.is_null());

      for i in 0..16 {
        assert_eq!(grown.add(i).read(), i as u8);
      }

      allocator.dealloc(grown, Layout::array::<u8>(256).unwrap());
    }
  }

  #[test]
  fn test_oversized_alignment_is_refused() {
    let allocator = LockedAllocator::with_source(FixedRegion::new(1 << 16));

    unsafe {
      let layout = Layout::from_size_align(64, 4 * DSIZE).unwrap();
      assert!(allocator.alloc(layout).is_null());
    }
  }
}
