//! # rmalloc - A First-Fit Region Allocator Library
//!
//! This crate provides a simple **first-fit allocator** implementation in
//! Rust that manages a single fixed-size region of memory obtained once
//! from the operating system with the `mmap` system call.
//!
//! ## Overview
//!
//! The whole region is covered by a gapless, address-ordered chain of
//! blocks. Each block is a small header followed by its payload; the byte
//! after one block's payload is exactly the next block's header:
//!
//! ```text
//!   First-Fit Region Concept:
//!
//!   ┌────────────────────────────────────────────────────────────────────┐
//!   │                    REGION (one mmap'd range)                       │
//!   │                                                                    │
//!   │   ┌────┬─────────┬────┬───────────┬────┬─────────────────────┐     │
//!   │   │ H1 │ payload │ H2 │  payload  │ H3 │       payload       │     │
//!   │   │busy│ (used)  │free│ (usable)  │busy│       (used)        │     │
//!   │   └────┴─────────┴────┴───────────┴────┴─────────────────────┘     │
//!   │    │               ▲                                               │
//!   │    └── next ───────┘  each header links to the next in             │
//!   │                       address order                                │
//!   └────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation takes the FIRST free block large enough and splits it.
//!   Release marks a block free and merges it with free neighbours.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rmalloc
//!   ├── align      - Alignment macro (align_to!)
//!   ├── block      - Block header and size/status encoding (internal)
//!   ├── region     - Mapped region ownership (internal)
//!   └── first_fit  - FirstFitAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rmalloc::FirstFitAllocator;
//!
//! fn main() {
//!     let mut allocator = FirstFitAllocator::init(4096).expect("mmap failed");
//!
//!     // Allocate 100 usable bytes
//!     let ptr = allocator.alloc(100).expect("no fitting free block");
//!
//!     // Use the memory
//!     unsafe { ptr.as_ptr().write(42) };
//!
//!     // Release the block (validated, coalesced with free neighbours)
//!     allocator.free(ptr.as_ptr()).expect("not a live block");
//!
//!     // Inspect the chain
//!     allocator.dump();
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block starts with a header carrying the chain link and a packed
//! size/status word:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────────┬────────────────────────────────┐
//!   │       Block Header        │          Payload               │
//!   │  ┌─────────────────────┐  │                                │
//!   │  │ next: offset / NIL  │  │  ┌──────────────────────────┐  │
//!   │  │ size_status: N | b  │  │  │   N bytes usable         │  │
//!   │  └─────────────────────┘  │  │   (N is a multiple of 4) │  │
//!   │                           │  └──────────────────────────┘  │
//!   └───────────────────────────┴────────────────────────────────┘
//!                               ▲
//!                               └── Pointer returned to the caller
//!
//!   size_status packs the payload size with a busy bit:
//!     free block  -> size_status == N
//!     busy block  -> size_status == N + 1
//! ```
//!
//! Blocks are identified by byte offset from the region base, so releasing
//! a pointer is a bounds check plus a chain scan rather than trusting the
//! caller's address.
//!
//! ## Features
//!
//! - **First-fit with splitting**: the first large-enough free block is
//!   carved into an allocation and a free remainder
//! - **Exhaustive coalescing**: no two adjacent free blocks survive a
//!   release, so a fully released region collapses back to one block
//! - **Validated release**: double frees, foreign pointers and null are
//!   reported as errors instead of corrupting the chain
//! - **Diagnostic listing**: a block-by-block report of the whole chain
//!
//! ## Limitations
//!
//! - **Single region**: one mapping per allocator, never grown or shrunk
//! - **Single-threaded only**: no synchronization primitives
//! - **4-byte granularity**: no stronger alignment guarantees
//! - **No resizing**: no realloc-style operation on live blocks
//! - **Unix-only**: requires `libc` and `mmap` (POSIX systems)
//!
//! ## Safety
//!
//! Obtaining and releasing memory through the allocator is safe; the
//! allocator never dereferences caller pointers. Reading and writing the
//! payload bytes behind a returned pointer is the caller's `unsafe`.

pub mod align;
mod block;
mod first_fit;
mod region;

pub use first_fit::{
  BlockInfo, Blocks, FirstFitAllocator, FreeError, GRANULARITY, RegionReport, RegionStats,
};
pub use region::InitError;
