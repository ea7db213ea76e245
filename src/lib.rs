//! # heapsim - A Simulated-Heap Memory Allocator
//!
//! This crate implements the classic malloc family (`allocate`, `free`,
//! `zero_allocate`, `resize`) on top of a fixed-size simulated heap arena,
//! without ever routing a user request through the host allocator. The
//! arena's bytes are reserved from the OS exactly once per [`Heap`]; from
//! then on the allocator manages them itself with an address-ordered free
//! list and a simulated program break.
//!
//! ## Overview
//!
//! ```text
//!   Arena (fixed capacity, e.g. 200 MB)
//!
//!   +--------+---------+--------+---------+------------+- - - - - - -+
//!   | Header | Alloc A | Header | Free    | Header | B |  unbacked   |
//!   +--------+---------+--------+---|-----+--------+---+- - - - - - -+
//!   0                              |                   ^             ^
//!            free list head -------+         program break       capacity
//! ```
//!
//! Every block, allocated or free, starts with a 24-byte header. Free
//! blocks are linked into a doubly linked list kept in strictly ascending
//! address order; allocation is first-fit with block splitting, and freeing
//! re-splices the block and merges any physically adjacent free neighbors
//! so fragmentation stays bounded. When no free block fits, the program
//! break advances in batches (request plus a fixed margin), and the margin
//! becomes fresh trailing free space.
//!
//! ## Crate structure
//!
//! ```text
//!   heapsim
//!   ├── backing   - one-shot OS reservation (mmap / VirtualAlloc)
//!   ├── arena     - fixed byte range + program break, bounds-checked access
//!   ├── block     - 24-byte header model, offset-encoded links
//!   ├── freelist  - address-ordered list: first-fit, split, coalesce
//!   ├── heap      - the allocator context and the four operations
//!   └── utils     - alignment helper
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use heapsim::Heap;
//!
//! let mut heap = Heap::new();
//!
//! let ptr = heap.allocate(100).expect("heap exhausted");
//! heap.payload_mut(ptr)[..5].copy_from_slice(b"hello");
//! assert_eq!(&heap.payload(ptr)[..5], b"hello");
//!
//! heap.free(Some(ptr));
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: one logical owner, no synchronization.
//! - **First-fit, no size classes**: a deliberate simplicity/speed trade
//!   over fragmentation, mirroring a textbook free-list allocator.
//! - **Full-copy resize**: [`Heap::resize`] never grows in place.
//! - **Weak repeat-free detection**: only blocks still on the free list
//!   are recognized; freeing a reallocated address twice is undefined.

mod arena;
mod backing;
mod block;
mod freelist;
mod heap;
mod utils;

pub use heap::{ALIGNMENT, HEAP_SIZE, Heap, HeapPtr, PROGRAM_BREAK_EXTEND};
