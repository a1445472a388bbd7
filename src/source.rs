//! Heap-growth primitives.
//!
//! The allocator never talks to the operating system directly; it asks a
//! [`MemorySource`] for more room. A source models a single contiguous,
//! never-shrinking address range: every successful extension starts exactly
//! where the previous one ended, which is what lets the allocator overwrite
//! its old epilogue header with the header of the newly grown block.

use std::alloc::{self, Layout};

use libc::{c_void, intptr_t, sbrk};

use crate::align_to;
use crate::block::DSIZE;

/// A growable, contiguous backing region.
pub trait MemorySource {
  /// Extends the region by `byte_count` bytes and returns the base address
  /// of the new part, which immediately follows the previously returned
  /// part. Returns null when the region cannot grow. `extend(0)` returns
  /// the current end of the region without growing it.
  fn extend(&mut self, byte_count: usize) -> *mut u8;
}

/// Grows the heap by moving the program break with `sbrk(2)`.
///
/// The process program break is shared state: any other code moving it
/// between two extensions breaks the contiguity contract, which the
/// allocator detects and treats as the source declining to grow.
pub struct Sbrk;

impl MemorySource for Sbrk {
  fn extend(&mut self, byte_count: usize) -> *mut u8 {
    let address = unsafe { sbrk(byte_count as intptr_t) };

    if address == usize::MAX as *mut c_void {
      return core::ptr::null_mut();
    }

    address as *mut u8
  }
}

/// A fixed-capacity heap region owned by the source itself.
///
/// Hands out successive slices of one double-word-aligned buffer and
/// declines once the capacity is exhausted. This is the source to use in
/// tests: each instance is an independent heap, so allocators under test
/// cannot interfere with each other or with the process heap.
pub struct FixedRegion {
  base: *mut u8,
  capacity: usize,
  used: usize,
}

impl FixedRegion {
  /// Reserves a region of `capacity` bytes, rounded up to the double-word
  /// unit. A capacity of zero (or a reservation failure) yields a region
  /// that declines every extension.
  pub fn new(capacity: usize) -> Self {
    let capacity = if capacity == 0 {
      0
    } else {
      align_to!(capacity, DSIZE)
    };

    let base = match Layout::from_size_align(capacity, DSIZE) {
      Ok(layout) if capacity > 0 => unsafe { alloc::alloc(layout) },
      _ => core::ptr::null_mut(),
    };

    Self {
      base,
      capacity,
      used: 0,
    }
  }

  /// Bytes still available for extension.
  pub fn remaining(&self) -> usize {
    if self.base.is_null() {
      0
    } else {
      self.capacity - self.used
    }
  }
}

impl MemorySource for FixedRegion {
  fn extend(&mut self, byte_count: usize) -> *mut u8 {
    if self.base.is_null() || byte_count > self.capacity - self.used {
      return core::ptr::null_mut();
    }

    let address = unsafe { self.base.add(self.used) };
    self.used += byte_count;

    address
  }
}

impl Drop for FixedRegion {
  fn drop(&mut self) {
    if !self.base.is_null() {
      // The layout is reconstructible because `capacity` was the rounded
      // size actually reserved.
      if let Ok(layout) = Layout::from_size_align(self.capacity, DSIZE) {
        unsafe { alloc::dealloc(self.base, layout) };
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fixed_region_is_contiguous() {
    let mut region = FixedRegion::new(256);

    let first = region.extend(64);
    let second = region.extend(32);

    assert!(!first.is_null());
    assert_eq!(second, first.wrapping_add(64));

    // Zero-byte extension peeks at the current end.
    assert_eq!(region.extend(0), first.wrapping_add(96));
  }

  #[test]
  fn test_fixed_region_alignment() {
    let mut region = FixedRegion::new(128);
    let base = region.extend(128);

    assert!(!base.is_null());
    assert_eq!(base as usize % DSIZE, 0);
  }

  #[test]
  fn test_fixed_region_exhaustion() {
    let mut region = FixedRegion::new(64);

    assert!(!region.extend(64).is_null());
    assert!(region.extend(1).is_null());

    // Declining an extension does not consume capacity.
    assert_eq!(region.remaining(), 0);
    assert!(!region.extend(0).is_null());
  }

  #[test]
  fn test_empty_region_declines() {
    let mut region = FixedRegion::new(0);

    assert!(region.extend(0).is_null());
    assert!(region.extend(16).is_null());
    assert_eq!(region.remaining(), 0);
  }
}
