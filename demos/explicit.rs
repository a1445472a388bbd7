use std::io::Read;

use exalloc::ExplicitAllocator;
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how allocations change the
/// program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  simple_logger::SimpleLogger::new()
    .with_level(log::LevelFilter::Debug)
    .init()
    .unwrap();

  // Our explicit free-list allocator over the program break. The heap is
  // laid out lazily on the first allocation: sentinel blocks plus one
  // 4 KiB free block.
  let mut allocator = ExplicitAllocator::new();

  unsafe {
    // Initial heap state
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate space for a u64. The first call initializes the heap,
    //    so the program break jumps by one chunk.
    // --------------------------------------------------------------------
    let first_block = allocator.allocate(std::mem::size_of::<u64>());
    println!("\n[1] Allocate u64 at {:?}", first_block);
    print_program_break("after first alloc");

    let first_ptr = first_block as *mut u64;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes. Odd-sized requests round up to the double-word
    //    unit, so this takes the same block size as the u64 above.
    // --------------------------------------------------------------------
    let second_block = allocator.allocate(12);
    println!("\n[2] Allocate 12 bytes at {:?}", second_block);
    std::ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Free the first block, then allocate again: the freed block is the
    //    head of the free list and is reused first.
    // --------------------------------------------------------------------
    allocator.free(first_block);
    println!("\n[3] Deallocated first_block at {:?}", first_block);

    let third_block = allocator.allocate(4);
    println!(
      "[3] third_block == first_block? {}",
      if third_block == first_block {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Resize with a free right neighbor: the block grows in place and
    //    keeps its address, no copying.
    // --------------------------------------------------------------------
    allocator.free(second_block);
    let grown = allocator.resize(third_block, 24);
    println!(
      "\n[4] Resize 4 -> 24 bytes: {:?} -> {:?} ({})",
      third_block,
      grown,
      if grown == third_block {
        "grew in place by absorbing the free neighbor"
      } else {
        "moved to a new block"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Allocate a large block to observe heap growth.
    //    This changes the result of `sbrk(0)`.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");

    let big_block = allocator.allocate(64 * 1024);
    println!("\n[5] Allocate large 64 KiB block at {:?}", big_block);

    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Walk the heap and the free list with the consistency checker.
    // --------------------------------------------------------------------
    println!("\n[6] Heap report:\n{}", allocator.check_heap(true));

    // --------------------------------------------------------------------
    // 7) End of demo. The OS reclaims all memory when the process exits.
    // --------------------------------------------------------------------
    allocator.free(grown);
    allocator.free(big_block);
    println!("[7] End of example. Process will exit and the OS will reclaim all memory.");
  }
}
