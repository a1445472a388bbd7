//! The explicit free-list allocator.
//!
//! One heap, bounded by a permanently allocated prologue block and a
//! zero-size epilogue header, grown on demand through a [`MemorySource`].
//! Free blocks are registered in an intrusive LIFO list and merged eagerly
//! with their physical neighbors, so no two adjacent blocks are ever both
//! free.

use core::{cmp, ptr};
use std::fmt::Write as _;

use crate::block::{self, DSIZE, MIN_BLOCK, WSIZE};
use crate::free_list::FreeList;
use crate::source::{MemorySource, Sbrk};
use crate::{align, align_to};

/// Bytes requested from the memory source when a fit search misses.
const CHUNKSIZE: usize = 1 << 12;

/// Failure modes of heap initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The memory source declined to provide the initial region.
  OutOfMemory,
}

/// A first-fit allocator over an explicit free list with boundary tags.
///
/// Single-threaded: the heap, the free-list head, and the initialization
/// state are plain mutable fields. Wrap the allocator in a
/// [`LockedAllocator`](crate::LockedAllocator) for concurrent use.
pub struct ExplicitAllocator<S: MemorySource = Sbrk> {
  source: S,
  /// Payload pointer of the prologue block; null until the first
  /// initialization has completed.
  prologue: *mut u8,
  /// Expected base of the next extension; guards the source's contiguity
  /// contract.
  heap_end: *mut u8,
  free_list: FreeList,
}

// The allocator exclusively owns the memory its raw pointers refer to.
unsafe impl<S: MemorySource + Send> Send for ExplicitAllocator<S> {}

impl ExplicitAllocator<Sbrk> {
  /// An allocator over the process program break.
  pub const fn new() -> Self {
    Self::with_source(Sbrk)
  }
}

impl<S: MemorySource> ExplicitAllocator<S> {
  /// An allocator over the given memory source.
  pub const fn with_source(source: S) -> Self {
    Self {
      source,
      prologue: ptr::null_mut(),
      heap_end: ptr::null_mut(),
      free_list: FreeList::new(),
    }
  }

  /// Lays down the prologue and epilogue sentinels and performs one
  /// initial extension. Called implicitly by the first allocation; calling
  /// it again after success is a no-op.
  pub fn init(&mut self) -> Result<(), AllocError> {
    if !self.prologue.is_null() {
      return Ok(());
    }

    // The source may start at an arbitrary address; absorb the slack so
    // payloads come out double-word aligned.
    let end = self.source.extend(0);
    if end.is_null() {
      return Err(AllocError::OutOfMemory);
    }
    let pad = end.align_offset(DSIZE);

    let base = self.extend_source(pad + 4 * WSIZE);
    if base.is_null() {
      return Err(AllocError::OutOfMemory);
    }

    unsafe {
      let base = base.add(pad);
      // One word of padding, the prologue's two tags, and the epilogue
      // header. The prologue is a permanently allocated double-word block
      // so backward navigation never runs off the start of the heap.
      (base as *mut usize).write(0);
      (base.add(WSIZE) as *mut usize).write(block::pack(DSIZE, true));
      (base.add(2 * WSIZE) as *mut usize).write(block::pack(DSIZE, true));
      (base.add(3 * WSIZE) as *mut usize).write(block::pack(0, true));
      self.prologue = base.add(2 * WSIZE);

      if self.extend_heap(CHUNKSIZE).is_null() {
        self.prologue = ptr::null_mut();
        return Err(AllocError::OutOfMemory);
      }
    }

    log::debug!("heap initialized, prologue at {:p}", self.prologue);
    Ok(())
  }

  /// Allocates a block with at least `size` usable bytes and returns its
  /// double-word-aligned payload pointer. Returns null when `size` is zero
  /// or the memory source declines to grow.
  ///
  /// # Safety
  ///
  /// The returned region is uninitialized; the caller must not read it
  /// before writing it.
  pub unsafe fn allocate(&mut self, size: usize) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }
    if self.init().is_err() {
      return ptr::null_mut();
    }
    let Some(asize) = align::adjust_request(size) else {
      return ptr::null_mut();
    };

    unsafe {
      let mut bp = self.free_list.find_first_fit(asize);

      if bp.is_null() {
        bp = self.extend_heap(cmp::max(asize, CHUNKSIZE));
        if bp.is_null() {
          log::debug!("allocate failed, requested={} adjusted={}", size, asize);
          return ptr::null_mut();
        }
      }

      self.free_list.remove(bp);
      self.place(bp, asize);

      log::trace!("allocate requested={} adjusted={} ptr={:p}", size, asize, bp);
      bp
    }
  }

  /// Returns a block to the heap. No-op on null.
  ///
  /// # Safety
  ///
  /// `bp` must be null or a pointer previously returned by this allocator
  /// and not freed since.
  pub unsafe fn free(&mut self, bp: *mut u8) {
    if bp.is_null() {
      return;
    }
    if self.prologue.is_null() {
      // The pointer cannot be one of ours; bring the heap up and bail.
      let _ = self.init();
      return;
    }

    unsafe {
      let size = block::block_size(bp);
      block::encode(bp, size, false);
      self.coalesce(bp);
    }

    log::trace!("free ptr={:p}", bp);
  }

  /// Resizes a block to at least `size` usable bytes.
  ///
  /// `resize(null, n)` allocates; `resize(bp, 0)` frees and returns null.
  /// A block is never shrunk in place: equal or smaller requests return
  /// `bp` unchanged. Growth first tries to absorb the physically following
  /// block when it is free and large enough, keeping the same address;
  /// otherwise the contents move to a fresh allocation and the old block
  /// is freed. Returns null (leaving the old block intact) only when that
  /// fresh allocation fails.
  ///
  /// # Safety
  ///
  /// `bp` must be null or a pointer previously returned by this allocator
  /// and not freed since.
  pub unsafe fn resize(
    &mut self,
    bp: *mut u8,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      unsafe { self.free(bp) };
      return ptr::null_mut();
    }
    if bp.is_null() {
      return unsafe { self.allocate(size) };
    }

    unsafe {
      let old_size = block::block_size(bp);
      let Some(asize) = align::adjust_request(size) else {
        return ptr::null_mut();
      };

      if asize <= old_size {
        return bp;
      }

      let next = block::next_block(bp);
      if !block::is_allocated(next)
        && old_size + block::block_size(next) - 2 * DSIZE >= asize
      {
        // The following free block is large enough: absorb it in place,
        // no data movement.
        let combined = old_size + block::block_size(next);
        self.free_list.remove(next);
        block::encode(bp, combined, true);

        log::trace!("resize in place ptr={:p} block={}", bp, combined);
        return bp;
      }

      let new_bp = self.allocate(size);
      if new_bp.is_null() {
        return ptr::null_mut();
      }

      ptr::copy_nonoverlapping(bp, new_bp, old_size - DSIZE);
      self.free(bp);

      log::trace!("resize copied {:p} -> {:p}", bp, new_bp);
      new_bp
    }
  }

  /// Extends the backing region, enforcing the source's contiguity
  /// contract: a region not starting at the previous heap end is refused.
  fn extend_source(&mut self, byte_count: usize) -> *mut u8 {
    let base = self.source.extend(byte_count);
    if base.is_null() {
      return ptr::null_mut();
    }

    if !self.heap_end.is_null() && base != self.heap_end {
      log::warn!(
        "memory source returned discontiguous region {:p}, expected {:p}",
        base,
        self.heap_end
      );
      return ptr::null_mut();
    }

    self.heap_end = base.wrapping_add(byte_count);
    base
  }

  /// Grows the heap by at least `bytes` and returns the payload pointer of
  /// the resulting free block, merged with the old last block when that
  /// one was free.
  unsafe fn extend_heap(&mut self, bytes: usize) -> *mut u8 {
    let size = align_to!(bytes, DSIZE);

    let bp = self.extend_source(size);
    if bp.is_null() {
      log::debug!("memory source declined extension of {} bytes", size);
      return ptr::null_mut();
    }

    unsafe {
      // The new region starts where the old epilogue header sat; that
      // word becomes the new block's header, and a fresh epilogue header
      // is written at the new end.
      block::encode(bp, size, false);
      block::header_ptr(block::next_block(bp)).write(block::pack(0, true));

      log::debug!("extended heap by {} bytes", size);
      self.coalesce(bp)
    }
  }

  /// Boundary-tag coalescing: merges `bp` with whichever physical
  /// neighbors are free and registers the merged block in the free list.
  /// Every freed block and every split remainder passes through here,
  /// which is what keeps adjacent free blocks from ever existing.
  unsafe fn coalesce(&mut self, bp: *mut u8) -> *mut u8 {
    unsafe {
      let prev_allocated = block::prev_allocated(bp);
      let next = block::next_block(bp);
      let next_allocated = block::is_allocated(next);

      let mut bp = bp;
      let mut size = block::block_size(bp);

      match (prev_allocated, next_allocated) {
        (true, true) => {}
        (true, false) => {
          size += block::block_size(next);
          self.free_list.remove(next);
          block::encode(bp, size, false);
        }
        (false, true) => {
          let prev = block::prev_block(bp);
          size += block::block_size(prev);
          self.free_list.remove(prev);
          bp = prev;
          block::encode(bp, size, false);
        }
        (false, false) => {
          let prev = block::prev_block(bp);
          size += block::block_size(prev) + block::block_size(next);
          self.free_list.remove(prev);
          self.free_list.remove(next);
          bp = prev;
          block::encode(bp, size, false);
        }
      }

      self.free_list.insert(bp);
      bp
    }
  }

  /// Carves an allocated block of `asize` bytes out of `bp`, which the
  /// caller has already removed from the free list. The tail is split off
  /// as a new free block when it can stand as a block of its own;
  /// otherwise the whole block is used and the slack becomes internal
  /// fragmentation.
  unsafe fn place(
    &mut self,
    bp: *mut u8,
    asize: usize,
  ) {
    unsafe {
      let csize = block::block_size(bp);

      if csize - asize >= MIN_BLOCK {
        block::encode(bp, asize, true);

        let rest = block::next_block(bp);
        block::encode(rest, csize - asize, false);
        self.coalesce(rest);
      } else {
        block::encode(bp, csize, true);
      }
    }
  }

  /// Walks the heap in address order and the free list in link order,
  /// independently, and returns a diagnostic report. Lines starting with
  /// `error:` describe structural problems; with `verbose` every block is
  /// listed. Nothing is repaired and nothing panics.
  pub fn check_heap(&self, verbose: bool) -> String {
    let mut report = String::new();

    if self.prologue.is_null() {
      let _ = writeln!(report, "heap not initialized");
      return report;
    }

    unsafe {
      if verbose {
        let _ = writeln!(report, "heap ({:p}):", self.prologue);
      }

      if block::block_size(self.prologue) != DSIZE
        || !block::is_allocated(self.prologue)
      {
        let _ = writeln!(report, "error: bad prologue header");
      }

      let mut bp = self.prologue;
      let mut heap_free = 0usize;
      let mut prev_was_free = false;

      while block::block_size(bp) > 0 {
        if verbose {
          self.report_block(&mut report, bp);
        }
        self.check_block(&mut report, bp);

        let free = !block::is_allocated(bp);
        if free && prev_was_free {
          let _ = writeln!(report, "error: adjacent free blocks at {:p}", bp);
        }
        if free {
          heap_free += 1;
        }
        prev_was_free = free;

        bp = block::next_block(bp);
      }

      if block::block_size(bp) != 0 || !block::is_allocated(bp) {
        let _ = writeln!(report, "error: bad epilogue header");
      }

      // Independent walk of the free list. The traversal is capped so a
      // cyclic list cannot hang the checker; the count mismatch is
      // reported below either way.
      let mut list_free = 0usize;
      let mut expected_prev = ptr::null_mut();
      let mut node = self.free_list.head();

      while !node.is_null() && list_free <= heap_free {
        if block::is_allocated(node) {
          let _ = writeln!(report, "error: allocated block {:p} on free list", node);
        }
        if block::prev_free(node) != expected_prev {
          let _ = writeln!(report, "error: inconsistent back link at {:p}", node);
        }

        list_free += 1;
        expected_prev = node;
        node = block::next_free(node);
      }

      if list_free != heap_free {
        let _ = writeln!(
          report,
          "error: free list holds {} blocks, heap walk found {}",
          list_free, heap_free
        );
      }

      if verbose {
        let _ = writeln!(report, "free list head: {:p}", self.free_list.head());
      }
    }

    report
  }

  unsafe fn check_block(
    &self,
    report: &mut String,
    bp: *mut u8,
  ) {
    unsafe {
      if bp as usize % DSIZE != 0 {
        let _ = writeln!(report, "error: {:p} is not double-word aligned", bp);
      }
      if *block::header_ptr(bp) != *block::footer_ptr(bp) {
        let _ = writeln!(report, "error: header does not match footer at {:p}", bp);
      }
    }
  }

  unsafe fn report_block(
    &self,
    report: &mut String,
    bp: *mut u8,
  ) {
    unsafe {
      let tag = |allocated: bool| if allocated { 'a' } else { 'f' };

      let _ = write!(
        report,
        "{:p}: header [{}|{}] footer [{}|{}]",
        bp,
        block::block_size(bp),
        tag(block::is_allocated(bp)),
        *block::footer_ptr(bp) & !0x1,
        tag(*block::footer_ptr(bp) & 0x1 != 0),
      );

      if !block::is_allocated(bp) {
        let _ = write!(
          report,
          " links [{:p}|{:p}]",
          block::next_free(bp),
          block::prev_free(bp),
        );
      }

      let _ = writeln!(report);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::FixedRegion;

  fn arena() -> ExplicitAllocator<FixedRegion> {
    ExplicitAllocator::with_source(FixedRegion::new(1 << 16))
  }

  #[test]
  fn test_alloc() {
    // Over the real program break, like the production configuration;
    // everything here fits in the initial chunk so the break only moves
    // during initialization.
    let mut allocator = ExplicitAllocator::new();

    unsafe {
      let first_addr = allocator.allocate(core::mem::size_of::<u64>()) as *mut u64;

      *first_addr = 3u64;

      assert_eq!(*first_addr, 3);

      let size: usize = 6;

      let second_addr = allocator.allocate(size * core::mem::size_of::<u16>()) as *mut u16;

      for i in 0..size {
        *(second_addr.add(i)) = (i + 1) as u16;
      }

      assert_eq!(*first_addr, 3);

      for i in 0..size {
        assert_eq!((i + 1) as u16, *(second_addr.add(i)))
      }

      allocator.free(first_addr as *mut u8);

      let third_addr = allocator.allocate(core::mem::size_of::<u32>()) as *mut u32;

      assert_eq!(first_addr as *mut u32, third_addr);
    }
  }

  #[test]
  fn test_init_failure_is_clean() {
    // Too small for even the initial extension.
    let mut allocator = ExplicitAllocator::with_source(FixedRegion::new(256));

    assert_eq!(allocator.init(), Err(AllocError::OutOfMemory));
    unsafe {
      assert!(allocator.allocate(8).is_null());
    }
    assert!(allocator.check_heap(false).contains("heap not initialized"));
  }

  #[test]
  fn test_exhaustion_returns_null_and_preserves_heap() {
    let mut allocator = ExplicitAllocator::with_source(FixedRegion::new(8192));

    unsafe {
      let a = allocator.allocate(64);
      assert!(!a.is_null());

      // Far beyond what the region can ever provide.
      assert!(allocator.allocate(1 << 20).is_null());

      // The failed extension left the heap structurally intact.
      assert!(!allocator.check_heap(false).contains("error:"));
      let b = allocator.allocate(64);
      assert!(!b.is_null());
    }
  }

  #[test]
  fn test_growth_beyond_initial_chunk() {
    let mut allocator = arena();

    unsafe {
      // Larger than the initial chunk forces a second extension.
      let big = allocator.allocate(3 * CHUNKSIZE);
      assert!(!big.is_null());
      assert_eq!(big as usize % DSIZE, 0);

      core::ptr::write_bytes(big, 0x5a, 3 * CHUNKSIZE);
      assert!(!allocator.check_heap(false).contains("error:"));
    }
  }

  #[test]
  fn test_verbose_report_lists_blocks() {
    let mut allocator = arena();

    unsafe {
      let a = allocator.allocate(24);
      let report = allocator.check_heap(true);

      assert!(report.contains(&format!("{:p}", a)));
      assert!(report.contains("free list head:"));
      assert!(!report.contains("error:"));
    }
  }

  /// A source that grows somewhere else on its second extension.
  struct Teleporting {
    inner: FixedRegion,
    calls: usize,
  }

  impl MemorySource for Teleporting {
    fn extend(&mut self, byte_count: usize) -> *mut u8 {
      self.calls += 1;
      if self.calls > 3 {
        // Skip a double word, then serve the request.
        let _ = self.inner.extend(DSIZE);
      }
      self.inner.extend(byte_count)
    }
  }

  #[test]
  fn test_discontiguous_source_is_refused() {
    let source = Teleporting {
      inner: FixedRegion::new(1 << 16),
      calls: 0,
    };
    let mut allocator = ExplicitAllocator::with_source(source);

    unsafe {
      // Initialization (peek + padding extension + chunk) stays contiguous.
      let a = allocator.allocate(64);
      assert!(!a.is_null());

      // The next growth comes back at the wrong address and is refused;
      // the allocator keeps serving from the intact free list.
      assert!(allocator.allocate(CHUNKSIZE).is_null());
      assert!(!allocator.check_heap(false).contains("error:"));
      assert!(!allocator.allocate(64).is_null());
    }
  }
}
