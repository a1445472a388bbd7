//! # exalloc - An Explicit Free-List Memory Allocator
//!
//! This crate provides a general-purpose **explicit free-list allocator**:
//! allocate/free/resize over a single contiguous heap grown via `sbrk`
//! (or any other [`MemorySource`]).
//!
//! ## Overview
//!
//! Every block carries a *boundary tag* at both ends; free blocks are
//! additionally chained into an intrusive doubly linked list stored in the
//! freed payload itself:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌────┬─────────┬──────────────┬───────────────────┬──────────────┬────┐
//!   │pad │prologue │ alloc block  │    free block     │ alloc block  │epi │
//!   │    │ hdr|ftr │ hdr|data|ftr │hdr|next|prev|…|ftr│ hdr|data|ftr │hdr │
//!   └────┴─────────┴──────────────┴───────────────────┴──────────────┴────┘
//!                                      ▲    ▲
//!                                      │    │
//!                             free-list links live inside
//!                             the unused free payload
//!
//!   Free list (unordered, LIFO):
//!
//!     head ──► block C ◄──► block A ◄──► block B ──► nil
//!              (most recently freed block is reused first)
//! ```
//!
//! The duplicate footer makes both physical neighbors inspectable in O(1),
//! so freed blocks merge eagerly with adjacent free blocks and no two
//! adjacent blocks are ever both free. Allocation is first-fit over the
//! list with splitting; resize absorbs a following free block in place
//! before falling back to allocate-copy-free.
//!
//! ## Crate Structure
//!
//! ```text
//!   exalloc
//!   ├── align      - alignment macro and the block-size policy
//!   ├── block      - boundary-tag layout primitives (internal)
//!   ├── free_list  - intrusive LIFO free list (internal)
//!   ├── source     - MemorySource trait, Sbrk and FixedRegion
//!   ├── explicit   - ExplicitAllocator: allocate / free / resize / check_heap
//!   └── global     - LockedAllocator: spin-locked GlobalAlloc wrapper
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use exalloc::ExplicitAllocator;
//!
//! fn main() {
//!     let mut allocator = ExplicitAllocator::new();
//!
//!     unsafe {
//!         let ptr = allocator.allocate(64) as *mut u64;
//!         *ptr = 42;
//!         println!("Value: {}", *ptr);
//!
//!         // Grow in place when the neighbor allows it.
//!         let ptr = allocator.resize(ptr as *mut u8, 128);
//!
//!         allocator.free(ptr);
//!     }
//! }
//! ```
//!
//! ## How It Works
//!
//! The production [`Sbrk`] source extends the program's data segment; a
//! [`FixedRegion`] source serves an owned buffer instead, so tests can run
//! any number of independent heaps. Either way the source only ever grows
//! a single contiguous range:
//!
//! ```text
//!   Program Memory Layout:
//!
//!   High Address ┌─────────────────────┐
//!                │       Stack         │ ↓ grows down
//!                │         │           │
//!                │         ▼           │
//!                │                     │
//!                │         ▲           │
//!                │         │           │
//!                │       Heap          │ ↑ grows up (sbrk)
//!                ├─────────────────────┤ ← Program Break
//!                │   Uninitialized     │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │   Initialized       │
//!                │       Data          │
//!                ├─────────────────────┤
//!                │       Text          │
//!   Low Address  └─────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Block reuse**: freed blocks are recycled through the explicit list
//! - **Eager coalescing**: adjacent free blocks merge on every free
//! - **In-place resize**: growth absorbs a following free block, no copy
//! - **Heap checker**: `check_heap` walks heap and free list independently
//! - **Pluggable growth**: any `MemorySource` can back the heap
//!
//! ## Limitations
//!
//! - **Double-word alignment only**: stricter layouts are refused
//! - **No shrinking**: resize to a smaller size keeps the block as is
//! - **No corruption detection**: a double free or an out-of-bounds write
//!   silently corrupts the heap; `check_heap` can diagnose some symptoms
//!   after the fact but nothing invokes it automatically
//! - **Single-threaded core**: use [`LockedAllocator`] across threads
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Allocation, deallocation and resize require `unsafe` blocks.

pub mod align;
mod block;
mod explicit;
mod free_list;
mod global;
mod source;

pub use explicit::{AllocError, ExplicitAllocator};
pub use global::LockedAllocator;
pub use source::{FixedRegion, MemorySource, Sbrk};
