//! The allocator context and its malloc-family API.
//!
//! A [`Heap`] owns one fixed-capacity [`Arena`] plus the free list over it,
//! and exposes the four operations: [`Heap::allocate`], [`Heap::free`],
//! [`Heap::zero_allocate`] and [`Heap::resize`]. Nothing is process-global;
//! independent heaps coexist freely, which is also what makes the allocator
//! testable without process restarts.
//!
//! Allocation handles are [`HeapPtr`] values: arena-relative payload
//! offsets, handed back to [`Heap::free`]/[`Heap::resize`] and turned into
//! byte slices through [`Heap::payload`]/[`Heap::payload_mut`]. `None`
//! plays the role of the null pointer.
//!
//! ```text
//!   allocate(n) ── free list miss ──> break extender ──> arena
//!   free(ptr)   ──> ordered splice ──> coalesce
//! ```
//!
//! Growth is batched: whenever the break must move, it moves past the new
//! block by an extra [`PROGRAM_BREAK_EXTEND`] margin and the margin is
//! registered as trailing free space, amortizing extension cost across many
//! small requests.

use crate::arena::Arena;
use crate::block::{BLOCK_HEADER_SIZE, BlockHeader};
use crate::freelist::FreeList;
use crate::utils::align;

/// Capacity of the simulated heap built by [`Heap::new`]: 200 MB.
pub const HEAP_SIZE: usize = 200_000_000;

/// Margin added to every program-break extension (1 MB) so that small
/// requests don't each pay for an extension.
pub const PROGRAM_BREAK_EXTEND: usize = 1024 * 1024;

/// Every payload size is rounded up to a multiple of this.
pub const ALIGNMENT: usize = 8;

/// Opaque handle to an allocated block: the arena-relative offset of its
/// payload (one header past the block's own start).
///
/// A `HeapPtr` is only meaningful to the [`Heap`] that produced it, and
/// only until it is freed. Using a stale handle whose address has since
/// been handed out again is undefined behavior at the allocator level:
/// the heap cannot tell the two owners apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeapPtr(usize);

impl HeapPtr {
    /// Arena-relative offset of the payload.
    pub fn offset(self) -> usize {
        self.0
    }

    fn header_offset(self) -> usize {
        self.0 - BLOCK_HEADER_SIZE
    }
}

/// A simulated process heap with malloc-family semantics.
pub struct Heap {
    arena: Arena,
    free: FreeList,
    break_extend: usize,
}

impl Heap {
    /// Builds a heap with the default constants: [`HEAP_SIZE`] capacity
    /// and [`PROGRAM_BREAK_EXTEND`] growth margin.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses the arena reservation.
    pub fn new() -> Self {
        Self::with_layout(HEAP_SIZE, PROGRAM_BREAK_EXTEND)
    }

    /// Builds a heap with an explicit capacity and break-extension margin.
    /// Both must be multiples of [`ALIGNMENT`], and the capacity must have
    /// room for at least one header-plus-minimal-payload block.
    ///
    /// # Panics
    ///
    /// Panics on a misaligned layout or if the OS refuses the reservation.
    pub fn with_layout(capacity: usize, break_extend: usize) -> Self {
        assert!(
            capacity >= BLOCK_HEADER_SIZE + ALIGNMENT,
            "capacity {capacity} cannot hold a single block"
        );
        assert!(
            capacity % ALIGNMENT == 0 && break_extend % ALIGNMENT == 0,
            "capacity and break_extend must be multiples of {ALIGNMENT}"
        );

        let arena = Arena::reserve(capacity).expect("failed to reserve arena memory from the OS");

        Self {
            arena,
            free: FreeList::new(),
            break_extend,
        }
    }

    /// Allocates `size` bytes and returns a handle to the payload, or
    /// `None` on exhaustion.
    ///
    /// A zero-size request is served as a minimal 8-byte block rather than
    /// rejected, and every size is rounded up to a multiple of
    /// [`ALIGNMENT`]. The block actually carved out may be up to one
    /// header's worth larger than requested: when first-fit leaves a
    /// remainder too small to hold a header, the remainder is donated to
    /// the allocation instead of becoming a free block that could never
    /// satisfy a header-plus-payload request.
    pub fn allocate(&mut self, size: usize) -> Option<HeapPtr> {
        let size = normalize(size)?;
        let total = size.checked_add(BLOCK_HEADER_SIZE)?;

        if total > self.arena.capacity() {
            return None;
        }

        // First request ever: bootstrap the backed range.
        if self.arena.brk() == 0 {
            return self.extend_and_place(0, size, None);
        }

        if let Some(offset) = self.free.first_fit(&self.arena, total) {
            let header = self.arena.read_header(offset);
            let leftover = header.size - total;

            if leftover > BLOCK_HEADER_SIZE {
                // Split: the low part becomes the allocation, the high
                // part a new free block inheriting the old neighbors.
                let remainder = offset + total;
                self.free
                    .replace(&mut self.arena, offset, remainder, leftover);
                self.arena
                    .write_header(offset, &BlockHeader::allocated(size));

                return Some(HeapPtr(offset + BLOCK_HEADER_SIZE));
            }

            if offset + header.size == self.arena.brk() {
                // The matched block sits at the end of the backed range
                // and the leftover would be an unusable stub: advance the
                // break and manufacture fresh trailing free space instead.
                return self.extend_and_place(offset, size, Some(offset));
            }

            // Leftover too small for a header: donate it to the
            // allocation and consume the free block whole.
            self.free.unlink(&mut self.arena, offset);
            self.arena
                .write_header(offset, &BlockHeader::allocated(size + leftover));

            return Some(HeapPtr(offset + BLOCK_HEADER_SIZE));
        }

        // No fit anywhere: grow from the break. A trailing free block that
        // ends exactly at the break is absorbed into the new allocation so
        // it doesn't linger as a dead stub behind it.
        let brk = self.arena.brk();
        let start = match self.free.tail() {
            Some(tail) if tail + self.arena.read_header(tail).size == brk => tail,
            _ => brk,
        };
        let reuse = (start != brk).then_some(start);

        self.extend_and_place(start, size, reuse)
    }

    /// Releases a block. `None` is a no-op, mirroring `free(NULL)`.
    ///
    /// A handle whose block is already on the free list is treated as a
    /// repeat free and ignored without corrupting the list. The detection
    /// is address-based and therefore weak: it cannot catch a stale free
    /// of an address that has since been reallocated.
    pub fn free(&mut self, ptr: Option<HeapPtr>) {
        let Some(ptr) = ptr else { return };

        let offset = ptr.header_offset();
        let header = self.arena.read_header(offset);

        // Fold the header back into the size: a free block's extent covers
        // its own metadata.
        if self
            .free
            .insert(&mut self.arena, offset, header.size + BLOCK_HEADER_SIZE)
        {
            self.free.coalesce(&mut self.arena);
        }
    }

    /// Allocates `count * elem_size` bytes with every payload byte zeroed,
    /// the calloc equivalent.
    ///
    /// Returns `None` on exhaustion or if the product overflows.
    pub fn zero_allocate(&mut self, count: usize, elem_size: usize) -> Option<HeapPtr> {
        let total = count.checked_mul(elem_size)?;
        let ptr = self.allocate(total)?;

        self.payload_mut(ptr).fill(0);

        Some(ptr)
    }

    /// Resizes a block, the realloc equivalent.
    ///
    /// `None` behaves as [`Heap::allocate`]; a zero `new_size` behaves as
    /// [`Heap::free`] and returns `None`. Otherwise a new block is
    /// allocated, the common prefix is copied byte for byte, and the old
    /// block is released. There is no in-place growth or shrink: every
    /// resize pays a full copy. On exhaustion the old block is left
    /// untouched and `None` is returned.
    pub fn resize(&mut self, ptr: Option<HeapPtr>, new_size: usize) -> Option<HeapPtr> {
        let Some(old) = ptr else {
            return self.allocate(new_size);
        };

        if new_size == 0 {
            self.free(Some(old));
            return None;
        }

        let new = self.allocate(new_size)?;

        let old_size = self.arena.read_header(old.header_offset()).size;
        let new_size = self.arena.read_header(new.header_offset()).size;
        self.arena
            .copy_within(old.offset(), new.offset(), old_size.min(new_size));

        self.free(Some(old));

        Some(new)
    }

    /// The payload bytes of a live allocated block.
    ///
    /// Only valid between the `allocate` that produced `ptr` and the
    /// `free`/`resize` that retires it; afterwards the slice contents are
    /// whatever the allocator has done with the memory since.
    pub fn payload(&self, ptr: HeapPtr) -> &[u8] {
        let size = self.arena.read_header(ptr.header_offset()).size;
        self.arena.slice(ptr.offset(), size)
    }

    /// Mutable access to the payload bytes of a live allocated block.
    pub fn payload_mut(&mut self, ptr: HeapPtr) -> &mut [u8] {
        let size = self.arena.read_header(ptr.header_offset()).size;
        self.arena.slice_mut(ptr.offset(), size)
    }

    /// Total capacity of the arena.
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Current program break: the boundary of backed arena memory.
    pub fn break_offset(&self) -> usize {
        self.arena.brk()
    }

    /// Total bytes on the free list, headers included.
    pub fn free_bytes(&self) -> usize {
        self.free.total_free(&self.arena)
    }

    /// Places an allocated block of payload `size` at `start`, advancing
    /// the break past it by the extension margin and registering the
    /// margin as trailing free space.
    ///
    /// `reuse` names a break-adjacent free block being swallowed by the
    /// placement; it is unlinked only after the capacity check, so a
    /// failed extension leaves the heap untouched.
    fn extend_and_place(
        &mut self,
        start: usize,
        size: usize,
        reuse: Option<usize>,
    ) -> Option<HeapPtr> {
        let end = start.checked_add(BLOCK_HEADER_SIZE + size)?;

        if end > self.arena.capacity() {
            return None;
        }

        if let Some(offset) = reuse {
            self.free.unlink(&mut self.arena, offset);
        }

        let new_brk = self
            .arena
            .extend_brk_to(end.saturating_add(self.break_extend));
        let tail_room = new_brk - end;

        // The margin becomes the new last free block, unless the clamp
        // left it too small to hold a header, in which case it is donated
        // to the allocation.
        let declared = if tail_room > BLOCK_HEADER_SIZE {
            self.free.push_back(&mut self.arena, end, tail_room);
            size
        } else {
            size + tail_room
        };

        self.arena
            .write_header(start, &BlockHeader::allocated(declared));

        Some(HeapPtr(start + BLOCK_HEADER_SIZE))
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Rounds a request up to a multiple of [`ALIGNMENT`], mapping zero to a
/// minimal block. `None` only on arithmetic overflow of the rounding.
fn normalize(size: usize) -> Option<usize> {
    if size == 0 {
        return Some(ALIGNMENT);
    }

    if size > usize::MAX - (ALIGNMENT - 1) {
        return None;
    }

    Some(align(size, ALIGNMENT))
}

#[cfg(test)]
impl Heap {
    /// Checks every free-list invariant the design promises: strict
    /// address ordering, mutually consistent links, no physically adjacent
    /// pair, and containment inside the backed range.
    fn assert_free_list_invariants(&self) {
        let blocks = self.free.blocks(&self.arena);

        let mut previous: Option<(usize, usize)> = None;
        for &(offset, size) in &blocks {
            assert!(
                size > BLOCK_HEADER_SIZE,
                "free block at {offset} too small to hold a header: {size}"
            );
            assert!(
                offset + size <= self.arena.brk(),
                "free block at {offset} extends past the break"
            );

            if let Some((prev_offset, prev_size)) = previous {
                assert!(prev_offset < offset, "free list not address-ordered");
                assert!(
                    prev_offset + prev_size < offset,
                    "adjacent free blocks at {prev_offset} and {offset} not merged"
                );
            }

            previous = Some((offset, size));
        }

        // Backward walk must mirror the forward walk exactly.
        let mut backwards = Vec::new();
        let mut cursor = self.free.tail();
        while let Some(offset) = cursor {
            let header = self.arena.read_header(offset);
            backwards.push((offset, header.size));
            cursor = header.prev;
        }
        backwards.reverse();
        assert_eq!(blocks, backwards, "prev links disagree with next links");
    }

    fn free_block_count(&self) -> usize {
        self.free.blocks(&self.arena).len()
    }
}
