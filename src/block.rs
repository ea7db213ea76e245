//! Block metadata model.
//!
//! Every block, allocated or free, is prefixed by a fixed-size header
//! embedded in the arena bytes:
//!
//! ```text
//! +---------------------+ <------+
//! |        size         |        |
//! +---------------------+        |
//! |        next         |        | -> Header (24 bytes)
//! +---------------------+        |
//! |        prev         |        |
//! +---------------------+ <------+
//! |       Payload       |
//! |         ...         |
//! +---------------------+
//! ```
//!
//! `next` and `prev` are free-list links and are only meaningful while the
//! block sits on the free list; for an allocated block they are cleared and
//! nothing may rely on them. `size` tracks the payload size of an allocated
//! block; freeing folds the header back in, so a free block's `size` covers
//! its full extent, header included.
//!
//! Headers never exist as Rust objects inside the arena. They are
//! encoded/decoded at arena-relative offsets, so every access goes through
//! bounds-checked slice indexing instead of header-at-negative-offset
//! pointer casts.

/// Header size of a block: three 8-byte fields.
pub(crate) const BLOCK_HEADER_SIZE: usize = 24;

/// Link field value meaning "no neighbor".
const NO_LINK: u64 = u64::MAX;

/// Decoded form of a block header.
///
/// Links are arena-relative offsets of the neighboring free-block headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    /// Size of the block. Payload bytes while allocated, full extent
    /// (header included) while free.
    pub size: usize,
    /// Offset of the next free block, ascending-address order.
    pub next: Option<usize>,
    /// Offset of the previous free block.
    pub prev: Option<usize>,
}

impl BlockHeader {
    /// Header for a freshly allocated block: list links cleared.
    pub fn allocated(size: usize) -> Self {
        Self {
            size,
            next: None,
            prev: None,
        }
    }

    /// Decodes a header from `raw`, which must be exactly
    /// [`BLOCK_HEADER_SIZE`] bytes.
    pub fn read_from(raw: &[u8]) -> Self {
        debug_assert_eq!(raw.len(), BLOCK_HEADER_SIZE);

        Self {
            size: read_word(raw, 0) as usize,
            next: decode_link(read_word(raw, 8)),
            prev: decode_link(read_word(raw, 16)),
        }
    }

    /// Encodes the header into `raw`, which must be exactly
    /// [`BLOCK_HEADER_SIZE`] bytes.
    pub fn write_to(&self, raw: &mut [u8]) {
        debug_assert_eq!(raw.len(), BLOCK_HEADER_SIZE);

        write_word(raw, 0, self.size as u64);
        write_word(raw, 8, encode_link(self.next));
        write_word(raw, 16, encode_link(self.prev));
    }
}

fn encode_link(link: Option<usize>) -> u64 {
    match link {
        Some(offset) => offset as u64,
        None => NO_LINK,
    }
}

fn decode_link(word: u64) -> Option<usize> {
    if word == NO_LINK {
        None
    } else {
        Some(word as usize)
    }
}

fn read_word(raw: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&raw[at..at + 8]);
    u64::from_ne_bytes(bytes)
}

fn write_word(raw: &mut [u8], at: usize, word: u64) {
    raw[at..at + 8].copy_from_slice(&word.to_ne_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_raw_bytes() {
        let header = BlockHeader {
            size: 4096,
            next: Some(128),
            prev: Some(0),
        };

        let mut raw = [0u8; BLOCK_HEADER_SIZE];
        header.write_to(&mut raw);

        assert_eq!(header, BlockHeader::read_from(&raw));
    }

    #[test]
    fn missing_links_survive_encoding() {
        let header = BlockHeader::allocated(64);

        let mut raw = [0u8; BLOCK_HEADER_SIZE];
        header.write_to(&mut raw);
        let decoded = BlockHeader::read_from(&raw);

        assert_eq!(decoded.size, 64);
        assert!(decoded.next.is_none());
        assert!(decoded.prev.is_none());
    }

    #[test]
    fn offset_zero_is_a_valid_link() {
        // Offset 0 is the base of the arena, a perfectly valid block
        // address. Only the all-ones pattern means "no neighbor".
        let header = BlockHeader {
            size: 32,
            next: Some(0),
            prev: None,
        };

        let mut raw = [0u8; BLOCK_HEADER_SIZE];
        header.write_to(&mut raw);

        assert_eq!(BlockHeader::read_from(&raw).next, Some(0));
    }
}
