//! Address-ordered doubly linked list of free blocks.
//!
//! The list is intrusive: the links live inside the block headers embedded
//! in the arena, encoded as arena-relative offsets. The [`FreeList`] itself
//! only remembers the head and tail offsets.
//!
//! ```text
//!              Free List (ascending addresses)
//!
//!        head                                    tail
//!         |                                       |
//!  +------v------+    +-------------+    +--------v----+
//!  | Free  @ 0   |<-->| Free @ 640  |<-->| Free @ 2048 |
//!  +-------------+    +-------------+    +-------------+
//! ```
//!
//! Invariants maintained by every operation here:
//!
//! 1. Offsets are strictly ascending from head to tail; `prev`/`next`
//!    are mutually consistent.
//! 2. No two free blocks are physically adjacent (the coalescing pass
//!    merges any pair whose extents touch).
//! 3. Every free block lies entirely inside `[0, break)`.

use crate::arena::Arena;
use crate::block::BlockHeader;

pub(crate) struct FreeList {
    head: Option<usize>,
    tail: Option<usize>,
}

impl FreeList {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    #[inline]
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// First-fit search: the first block (in address order) whose size
    /// strictly exceeds `needed` bytes, where `needed` already accounts
    /// for the header of the block being carved out.
    pub fn first_fit(&self, arena: &Arena, needed: usize) -> Option<usize> {
        let mut cursor = self.head;

        while let Some(offset) = cursor {
            let header = arena.read_header(offset);

            if header.size > needed {
                return Some(offset);
            }

            cursor = header.next;
        }

        None
    }

    /// Splices a block of `size` bytes (header included) into the list at
    /// its address-ordered position.
    ///
    /// Returns `false` without touching the list if a free block already
    /// sits at `offset`: that is a repeat free. The detection is purely
    /// address-based, so it only catches blocks still on the list, not
    /// use-after-free of an address that has since been reallocated.
    pub fn insert(&mut self, arena: &mut Arena, offset: usize, size: usize) -> bool {
        // Find the first free block past the one being inserted.
        let mut cursor = self.head;
        let mut prev = None;

        while let Some(current) = cursor {
            if current == offset {
                return false;
            }

            if current > offset {
                break;
            }

            prev = Some(current);
            cursor = arena.read_header(current).next;
        }

        arena.write_header(
            offset,
            &BlockHeader {
                size,
                next: cursor,
                prev,
            },
        );

        match prev {
            Some(prev_offset) => {
                let mut prev_header = arena.read_header(prev_offset);
                prev_header.next = Some(offset);
                arena.write_header(prev_offset, &prev_header);
            }
            None => self.head = Some(offset),
        }

        match cursor {
            Some(next_offset) => {
                let mut next_header = arena.read_header(next_offset);
                next_header.prev = Some(offset);
                arena.write_header(next_offset, &next_header);
            }
            None => self.tail = Some(offset),
        }

        true
    }

    /// Unlinks the block at `offset` from the list. Its header is left
    /// behind for the caller to overwrite.
    pub fn unlink(&mut self, arena: &mut Arena, offset: usize) {
        let header = arena.read_header(offset);

        match header.prev {
            Some(prev_offset) => {
                let mut prev_header = arena.read_header(prev_offset);
                prev_header.next = header.next;
                arena.write_header(prev_offset, &prev_header);
            }
            None => self.head = header.next,
        }

        match header.next {
            Some(next_offset) => {
                let mut next_header = arena.read_header(next_offset);
                next_header.prev = header.prev;
                arena.write_header(next_offset, &next_header);
            }
            None => self.tail = header.prev,
        }
    }

    /// Replaces the node at `old` with a node at `new` of `size` bytes,
    /// inheriting `old`'s neighbors. Used when splitting: the remainder
    /// takes the split block's place in the list.
    pub fn replace(&mut self, arena: &mut Arena, old: usize, new: usize, size: usize) {
        let header = arena.read_header(old);

        arena.write_header(
            new,
            &BlockHeader {
                size,
                next: header.next,
                prev: header.prev,
            },
        );

        match header.prev {
            Some(prev_offset) => {
                let mut prev_header = arena.read_header(prev_offset);
                prev_header.next = Some(new);
                arena.write_header(prev_offset, &prev_header);
            }
            None => self.head = Some(new),
        }

        match header.next {
            Some(next_offset) => {
                let mut next_header = arena.read_header(next_offset);
                next_header.prev = Some(new);
                arena.write_header(next_offset, &next_header);
            }
            None => self.tail = Some(new),
        }
    }

    /// Appends a block past every existing node. Only valid for fresh
    /// trailing space manufactured by a break extension, which is always
    /// the highest address in the backed range.
    pub fn push_back(&mut self, arena: &mut Arena, offset: usize, size: usize) {
        debug_assert!(self.tail.is_none_or(|tail| tail < offset));

        arena.write_header(
            offset,
            &BlockHeader {
                size,
                next: None,
                prev: self.tail,
            },
        );

        match self.tail {
            Some(tail_offset) => {
                let mut tail_header = arena.read_header(tail_offset);
                tail_header.next = Some(offset);
                arena.write_header(tail_offset, &tail_header);
            }
            None => self.head = Some(offset),
        }

        self.tail = Some(offset);
    }

    /// Merges every pair of physically adjacent free blocks, re-checking a
    /// merged block against its new successor before moving on. Terminates
    /// once no adjacent pair remains.
    pub fn coalesce(&mut self, arena: &mut Arena) {
        let mut cursor = self.head;

        while let Some(offset) = cursor {
            let header = arena.read_header(offset);

            match header.next {
                Some(next_offset) if offset + header.size == next_offset => {
                    let next_header = arena.read_header(next_offset);

                    // Absorb the neighbor: its header is destroyed by
                    // becoming part of this block's extent.
                    arena.write_header(
                        offset,
                        &BlockHeader {
                            size: header.size + next_header.size,
                            next: next_header.next,
                            prev: header.prev,
                        },
                    );

                    match next_header.next {
                        Some(after_offset) => {
                            let mut after_header = arena.read_header(after_offset);
                            after_header.prev = Some(offset);
                            arena.write_header(after_offset, &after_header);
                        }
                        None => self.tail = Some(offset),
                    }

                    // Recheck the merged block against its new successor.
                }
                _ => cursor = header.next,
            }
        }
    }

    /// Total free bytes (headers included) across the list.
    pub fn total_free(&self, arena: &Arena) -> usize {
        let mut total = 0;
        let mut cursor = self.head;

        while let Some(offset) = cursor {
            let header = arena.read_header(offset);
            total += header.size;
            cursor = header.next;
        }

        total
    }

    /// `(offset, size)` of every free block in list order.
    #[cfg(test)]
    pub fn blocks(&self, arena: &Arena) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut cursor = self.head;

        while let Some(offset) = cursor {
            let header = arena.read_header(offset);
            out.push((offset, header.size));
            cursor = header.next;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_HEADER_SIZE;

    fn backed_arena(capacity: usize) -> Arena {
        let mut arena = Arena::reserve(capacity).expect("reservation failed");
        arena.extend_brk_to(capacity);
        arena
    }

    #[test]
    fn insert_keeps_ascending_address_order() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        assert!(list.insert(&mut arena, 512, 64));
        assert!(list.insert(&mut arena, 0, 64));
        assert!(list.insert(&mut arena, 1024, 64));

        assert_eq!(
            list.blocks(&arena),
            vec![(0, 64), (512, 64), (1024, 64)]
        );
        assert_eq!(list.head(), Some(0));
        assert_eq!(list.tail(), Some(1024));
    }

    #[test]
    fn insert_links_are_mutually_consistent() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        list.insert(&mut arena, 256, 64);
        list.insert(&mut arena, 0, 64);
        list.insert(&mut arena, 768, 64);

        let middle = arena.read_header(256);
        assert_eq!(middle.prev, Some(0));
        assert_eq!(middle.next, Some(768));
        assert_eq!(arena.read_header(0).next, Some(256));
        assert_eq!(arena.read_header(768).prev, Some(256));
    }

    #[test]
    fn repeat_free_is_rejected() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        assert!(list.insert(&mut arena, 128, 64));
        assert!(!list.insert(&mut arena, 128, 64));

        assert_eq!(list.blocks(&arena), vec![(128, 64)]);
    }

    #[test]
    fn unlink_head_middle_and_tail() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        for offset in [0, 256, 512, 768] {
            list.insert(&mut arena, offset, 64);
        }

        list.unlink(&mut arena, 256);
        assert_eq!(list.blocks(&arena), vec![(0, 64), (512, 64), (768, 64)]);

        list.unlink(&mut arena, 0);
        assert_eq!(list.head(), Some(512));

        list.unlink(&mut arena, 768);
        assert_eq!(list.tail(), Some(512));

        list.unlink(&mut arena, 512);
        assert!(list.is_empty());
        assert_eq!(list.tail(), None);
    }

    #[test]
    fn first_fit_requires_strictly_larger_block() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        list.insert(&mut arena, 0, 64);
        list.insert(&mut arena, 512, 128);

        // Exactly 64 does not fit in the 64-byte block.
        assert_eq!(list.first_fit(&arena, 64), Some(512));
        assert_eq!(list.first_fit(&arena, 63), Some(0));
        assert_eq!(list.first_fit(&arena, 4000), None);
    }

    #[test]
    fn coalesce_merges_an_adjacent_chain() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        // Three touching blocks followed by a detached one.
        list.insert(&mut arena, 0, 64);
        list.insert(&mut arena, 64, 64);
        list.insert(&mut arena, 128, 64);
        list.insert(&mut arena, 1024, 64);

        list.coalesce(&mut arena);

        assert_eq!(list.blocks(&arena), vec![(0, 192), (1024, 64)]);
        assert_eq!(arena.read_header(1024).prev, Some(0));
    }

    #[test]
    fn coalesce_updates_the_tail() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        list.insert(&mut arena, 512, 64);
        list.insert(&mut arena, 576, 64);

        list.coalesce(&mut arena);

        assert_eq!(list.blocks(&arena), vec![(512, 128)]);
        assert_eq!(list.tail(), Some(512));
    }

    #[test]
    fn replace_preserves_neighbors() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        list.insert(&mut arena, 0, 64);
        list.insert(&mut arena, 256, 128);
        list.insert(&mut arena, 1024, 64);

        // Simulate splitting the middle block: remainder takes its place.
        let remainder = 256 + BLOCK_HEADER_SIZE + 40;
        list.replace(&mut arena, 256, remainder, 64);

        assert_eq!(
            list.blocks(&arena),
            vec![(0, 64), (remainder, 64), (1024, 64)]
        );
        assert_eq!(arena.read_header(0).next, Some(remainder));
        assert_eq!(arena.read_header(1024).prev, Some(remainder));
    }

    #[test]
    fn push_back_becomes_the_new_tail() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        list.push_back(&mut arena, 0, 64);
        list.push_back(&mut arena, 2048, 128);

        assert_eq!(list.blocks(&arena), vec![(0, 64), (2048, 128)]);
        assert_eq!(list.tail(), Some(2048));
        assert_eq!(arena.read_header(2048).prev, Some(0));
    }

    #[test]
    fn total_free_sums_all_blocks() {
        let mut arena = backed_arena(4096);
        let mut list = FreeList::new();

        assert_eq!(list.total_free(&arena), 0);

        list.insert(&mut arena, 0, 64);
        list.insert(&mut arena, 512, 96);

        assert_eq!(list.total_free(&arena), 160);
    }
}
