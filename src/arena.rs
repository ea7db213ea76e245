//! Arena and program break.
//!
//! The arena is a single contiguous, fixed-capacity byte range standing in
//! for process heap memory. The program break is an offset into it marking
//! the boundary between backed (usable) and unbacked bytes:
//!
//! ```text
//!  offset 0                      break                       capacity
//!  +------------------------------+---------------------------+
//!  |  backed: blocks live here    |   unbacked, not yet used  |
//!  +------------------------------+---------------------------+
//! ```
//!
//! The break starts at 0 (nothing backed), only ever moves forward, and is
//! always clamped to the capacity. Only [`crate::heap::Heap`] advances it.

use crate::backing::Backing;
use crate::block::{BLOCK_HEADER_SIZE, BlockHeader};

pub(crate) struct Arena {
    backing: Backing,
    brk: usize,
}

impl Arena {
    /// Reserves a fresh arena of `capacity` bytes with the break at 0.
    pub fn reserve(capacity: usize) -> Option<Self> {
        let backing = Backing::reserve(capacity)?;

        Some(Self { backing, brk: 0 })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.backing.len()
    }

    #[inline]
    pub fn brk(&self) -> usize {
        self.brk
    }

    /// Moves the break forward towards `target`, clamping at the capacity.
    /// The break never moves backward. Returns the new break.
    pub fn extend_brk_to(&mut self, target: usize) -> usize {
        self.brk = target.min(self.capacity()).max(self.brk);
        self.brk
    }

    /// Decodes the block header at `offset`. The header must lie inside
    /// the backed range.
    pub fn read_header(&self, offset: usize) -> BlockHeader {
        debug_assert!(offset + BLOCK_HEADER_SIZE <= self.brk);

        BlockHeader::read_from(&self.backing.bytes()[offset..offset + BLOCK_HEADER_SIZE])
    }

    /// Encodes `header` at `offset` inside the backed range.
    pub fn write_header(&mut self, offset: usize, header: &BlockHeader) {
        debug_assert!(offset + BLOCK_HEADER_SIZE <= self.brk);

        header.write_to(&mut self.backing.bytes_mut()[offset..offset + BLOCK_HEADER_SIZE]);
    }

    /// A bounds-checked view of `len` bytes starting at `start`.
    pub fn slice(&self, start: usize, len: usize) -> &[u8] {
        &self.backing.bytes()[start..start + len]
    }

    pub fn slice_mut(&mut self, start: usize, len: usize) -> &mut [u8] {
        &mut self.backing.bytes_mut()[start..start + len]
    }

    /// Copies `len` bytes from `src` to `dst` within the arena. The ranges
    /// may overlap.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        self.backing.bytes_mut().copy_within(src..src + len, dst);
    }
}
