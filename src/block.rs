//! Boundary-tag block layout.
//!
//! Every block carries its size and allocation flag packed into one word,
//! written twice: a header one word before the payload and a footer at the
//! end of the block. The duplicate footer lets a neighbor be inspected by
//! stepping backward without any side table. Free blocks reuse their first
//! two payload words as the free-list link fields.
//!
//! ```text
//!   Allocated block:                 Free block:
//!   ┌────┬──────────────┬────┐       ┌────┬────┬────┬───────┬────┐
//!   │hdr │   payload    │ftr │       │hdr │next│prev│ unused│ftr │
//!   └────┴──────────────┴────┘       └────┴────┴────┴───────┴────┘
//!        ▲                                ▲
//!        └── payload pointer              └── payload pointer
//! ```
//!
//! All functions here take the *payload* pointer of a block and perform no
//! bounds checking; callers must guarantee the address lies inside the
//! managed heap, between the prologue and the epilogue.

use core::mem;

/// Size of one boundary tag in bytes: one machine word.
pub const WSIZE: usize = mem::size_of::<usize>();

/// Double-word size: the alignment unit for block sizes and payloads.
pub const DSIZE: usize = 2 * WSIZE;

/// Smallest legal block: both tags plus room for the two link words.
pub const MIN_BLOCK: usize = 2 * DSIZE;

/// Low bit of a tag word carries the allocation flag.
const ALLOC_MASK: usize = 0x1;

/// Remaining bits carry the block size, always a `DSIZE` multiple.
const SIZE_MASK: usize = !(DSIZE - 1);

/// Packs a block size and allocation flag into one tag word.
#[inline]
pub(crate) fn pack(
  size: usize,
  allocated: bool,
) -> usize {
  size | allocated as usize
}

/// Address of the header tag of the block at `bp`.
#[inline]
pub(crate) unsafe fn header_ptr(bp: *mut u8) -> *mut usize {
  unsafe { bp.sub(WSIZE) as *mut usize }
}

/// Full size of the block at `bp`, tags included.
#[inline]
pub(crate) unsafe fn block_size(bp: *mut u8) -> usize {
  unsafe { *header_ptr(bp) & SIZE_MASK }
}

/// Whether the block at `bp` is currently allocated.
#[inline]
pub(crate) unsafe fn is_allocated(bp: *mut u8) -> bool {
  unsafe { *header_ptr(bp) & ALLOC_MASK != 0 }
}

/// Address of the footer tag of the block at `bp`, derived from its header.
#[inline]
pub(crate) unsafe fn footer_ptr(bp: *mut u8) -> *mut usize {
  unsafe { bp.add(block_size(bp) - DSIZE) as *mut usize }
}

/// Writes matching header and footer for a block of `size` bytes at `bp`.
///
/// The footer position is computed from the new size, so this also serves
/// to grow a block over its right-hand neighbors during coalescing.
#[inline]
pub(crate) unsafe fn encode(
  bp: *mut u8,
  size: usize,
  allocated: bool,
) {
  unsafe {
    *header_ptr(bp) = pack(size, allocated);
    *footer_ptr(bp) = pack(size, allocated);
  }
}

/// Payload pointer of the physically following block.
#[inline]
pub(crate) unsafe fn next_block(bp: *mut u8) -> *mut u8 {
  unsafe { bp.add(block_size(bp)) }
}

/// Payload pointer of the physically preceding block, found through the
/// preceding block's footer.
#[inline]
pub(crate) unsafe fn prev_block(bp: *mut u8) -> *mut u8 {
  unsafe {
    let prev_size = *(bp.sub(DSIZE) as *const usize) & SIZE_MASK;
    bp.sub(prev_size)
  }
}

/// Whether the physically preceding block is allocated, read from its
/// footer without computing its payload address.
#[inline]
pub(crate) unsafe fn prev_allocated(bp: *mut u8) -> bool {
  unsafe { *(bp.sub(DSIZE) as *const usize) & ALLOC_MASK != 0 }
}

/// Successor link of a free block, stored in its first payload word.
#[inline]
pub(crate) unsafe fn next_free(bp: *mut u8) -> *mut u8 {
  unsafe { *(bp as *const usize) as *mut u8 }
}

/// Predecessor link of a free block, stored in its second payload word.
#[inline]
pub(crate) unsafe fn prev_free(bp: *mut u8) -> *mut u8 {
  unsafe { *(bp.add(WSIZE) as *const usize) as *mut u8 }
}

#[inline]
pub(crate) unsafe fn set_next_free(
  bp: *mut u8,
  next: *mut u8,
) {
  unsafe { *(bp as *mut usize) = next as usize }
}

#[inline]
pub(crate) unsafe fn set_prev_free(
  bp: *mut u8,
  prev: *mut u8,
) {
  unsafe { *(bp.add(WSIZE) as *mut usize) = prev as usize }
}
