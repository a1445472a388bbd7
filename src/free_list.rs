//! Intrusive free-block registry.
//!
//! All free blocks are chained into one unordered doubly linked list whose
//! link words live inside the free blocks themselves, so the registry costs
//! nothing beyond a single head pointer. Insertion is last-in-first-out:
//! a freshly freed block becomes the new head and is the first candidate
//! for reuse.

use core::ptr;

use crate::block;

/// The free-block list. Only this type ever writes link fields.
pub(crate) struct FreeList {
  head: *mut u8,
}

impl FreeList {
  pub(crate) const fn new() -> Self {
    Self {
      head: ptr::null_mut(),
    }
  }

  /// Payload pointer of the list head, null when the list is empty.
  pub(crate) fn head(&self) -> *mut u8 {
    self.head
  }

  /// Pushes `bp` onto the front of the list. O(1).
  ///
  /// # Safety
  ///
  /// `bp` must be the payload pointer of a free block that is not already
  /// in the list.
  pub(crate) unsafe fn insert(&mut self, bp: *mut u8) {
    unsafe {
      block::set_next_free(bp, self.head);
      block::set_prev_free(bp, ptr::null_mut());

      if !self.head.is_null() {
        block::set_prev_free(self.head, bp);
      }

      self.head = bp;
    }
  }

  /// Splices `bp` out of the list and clears its links. O(1).
  ///
  /// # Safety
  ///
  /// `bp` must currently be a member of this list; removing a block twice
  /// corrupts the list.
  pub(crate) unsafe fn remove(&mut self, bp: *mut u8) {
    unsafe {
      let prevp = block::prev_free(bp);
      let nextp = block::next_free(bp);

      if prevp.is_null() {
        self.head = nextp;
      } else {
        block::set_next_free(prevp, nextp);
      }

      if !nextp.is_null() {
        block::set_prev_free(nextp, prevp);
      }

      block::set_next_free(bp, ptr::null_mut());
      block::set_prev_free(bp, ptr::null_mut());
    }
  }

  /// First-fit scan: the first block with size of at least `min_size`, in
  /// list order, or null when none fits. O(n) in the number of free blocks.
  ///
  /// # Safety
  ///
  /// Every list member must carry valid boundary tags.
  pub(crate) unsafe fn find_first_fit(&self, min_size: usize) -> *mut u8 {
    unsafe {
      let mut bp = self.head;

      while !bp.is_null() {
        if block::block_size(bp) >= min_size {
          return bp;
        }
        bp = block::next_free(bp);
      }

      ptr::null_mut()
    }
  }
}
