use std::ptr;

use rmalloc::{FirstFitAllocator, FreeError};

fn main() {
  // One fixed-size region, mapped once. Everything below is served out
  // of it; the process never touches the system allocator for payloads.
  let mut allocator = FirstFitAllocator::init(4096).expect("mmap failed");

  // --------------------------------------------------------------------
  // 1) Fresh region: a single free block spanning the whole mapping.
  // --------------------------------------------------------------------
  println!("\n[1] Freshly initialized region");
  allocator.dump();

  // --------------------------------------------------------------------
  // 2) Allocate three blocks. Each allocation carves the front off the
  //    first free block large enough and leaves the remainder free.
  // --------------------------------------------------------------------
  let first = allocator.alloc(100).expect("no fitting free block");
  let second = allocator.alloc(200).expect("no fitting free block");
  let third = allocator.alloc(300).expect("no fitting free block");

  println!("\n[2] After alloc(100), alloc(200), alloc(300)");
  println!(
    "    first = {:?}, second = {:?}, third = {:?}",
    first, second, third
  );
  allocator.dump();

  // The payload is ordinary usable memory.
  unsafe {
    ptr::write_bytes(first.as_ptr(), 0xAB, 100);
    println!(
      "    wrote 0xAB over the first block, first byte = 0x{:02X}",
      first.as_ptr().read()
    );
  }

  // --------------------------------------------------------------------
  // 3) Release the middle block. Its neighbours are busy, so it stays a
  //    lone free block - no coalescing across a busy block.
  // --------------------------------------------------------------------
  allocator.free(second.as_ptr()).expect("release failed");
  println!("\n[3] After freeing the middle block");
  allocator.dump();

  // --------------------------------------------------------------------
  // 4) Release the first block. It now touches the free middle block and
  //    the two merge into one larger free block.
  // --------------------------------------------------------------------
  allocator.free(first.as_ptr()).expect("release failed");
  println!("\n[4] After freeing the first block (merged with the middle)");
  allocator.dump();

  // --------------------------------------------------------------------
  // 5) Release the last block. Both merges fire and the chain collapses
  //    back to a single free block covering the region.
  // --------------------------------------------------------------------
  allocator.free(third.as_ptr()).expect("release failed");
  println!("\n[5] After freeing the last block (chain fully coalesced)");
  allocator.dump();

  // --------------------------------------------------------------------
  // 6) Misuse is reported, not trusted.
  // --------------------------------------------------------------------
  println!("\n[6] Misuse checks");

  let ptr = allocator.alloc(800).expect("no fitting free block");
  allocator.free(ptr.as_ptr()).expect("release failed");

  let double_free = allocator.free(ptr.as_ptr());
  println!("    double free         -> {double_free:?}");
  assert_eq!(Err(FreeError::AlreadyFree), double_free);

  let mut local = 50;
  let foreign = allocator.free(&mut local as *mut i32 as *mut u8);
  println!("    stack pointer       -> {foreign:?}");
  assert_eq!(Err(FreeError::UnknownBlock), foreign);

  let null = allocator.free(ptr::null_mut());
  println!("    null pointer        -> {null:?}");
  assert_eq!(Err(FreeError::NullPointer), null);

  println!("\n[7] End of demo. Dropping the allocator unmaps the region.");
}
