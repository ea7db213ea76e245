//! Helper functions for the allocator. These don't particularly belong
//! to any concrete module of the crate.

/// It aligns `to_be_aligned` using `alignment`, which must be a power of two.
///
/// Every request handed to the allocator is rounded up to a multiple of
/// [`crate::heap::ALIGNMENT`] so that payloads (and the headers placed
/// between them) always start on pointer-aligned offsets.
pub(crate) fn align(to_be_aligned: usize, alignment: usize) -> usize {
    (to_be_aligned + alignment - 1) & !(alignment - 1)
}
