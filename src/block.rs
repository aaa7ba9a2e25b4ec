use std::fmt;

use serde::Serialize;

use crate::utils::align;

/// Header size of a block in bytes. Every block starts with it and its payload
/// comes right after.
pub const HEADER_SIZE: usize = 2;

/// Biggest payload a header can describe. The size shares its byte with the
/// free flag, so only 7 bits are left for it.
pub const MAX_BLOCK_SIZE: usize = (u8::MAX >> 1) as usize;

/// This is the logical view of a block. The fields are decoded from the two
/// header bytes stored in the buffer at `addr`, content is placed after them.
///
/// ```text
/// +---------------------+ <------+
/// | size (7b) | free(1b)|        |
/// +---------------------+        | -> Header (2 bytes)
/// |     prev address    |        |
/// +---------------------+ <------+
/// |       Content       |        |
/// |         ...         |        | -> Payload (`size` bytes)
/// |         ...         |        |
/// +---------------------+ <------+
/// |  alignment slack    |
/// +---------------------+ <------- next = align(addr + HEADER_SIZE + size)
/// ```
///
/// `next` is never stored. It is derived from the address and size every time a
/// header is decoded, so a merge can't leave a dangling successor pointer behind.
///
/// A `Block` is a plain value. It's the handle callers give back to the
/// allocator, it doesn't borrow the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Address of the header inside the buffer.
    pub addr: usize,
    /// Size of the payload, header excluded.
    pub size: usize,
    /// Flag to tell whether the block is free or not.
    pub free: bool,
    /// Previous block in the list.
    pub prev: Option<usize>,
    /// Next block in the list.
    pub next: Option<usize>,
}

impl Block {
    /// A block whose `next` is not known yet. It gets derived once the
    /// header is written and read back.
    pub(crate) fn new(addr: usize, size: usize, free: bool, prev: Option<usize>) -> Self {
        Self { addr, size, free, prev, next: None }
    }

    /// Decodes the `header` bytes found at `addr`.
    ///
    /// A `prev` byte that isn't strictly below `addr` means the block is the
    /// first one. The derived `next` is dropped when it falls outside
    /// `(addr, capacity)`.
    pub(crate) fn decode(
        addr: usize,
        header: [u8; HEADER_SIZE],
        chunk_size: usize,
        capacity: usize,
    ) -> Self {
        let free = header[0] & 1 == 1;
        let size = (header[0] >> 1) as usize;

        let prev = header[1] as usize;
        let prev = (prev < addr).then_some(prev);

        let next = next_addr(addr, size, chunk_size, capacity);

        Self { addr, size, free, prev, next }
    }

    /// Packs the stored fields of the block. `next` is left out on purpose.
    ///
    /// The allocator never builds blocks whose size or prev don't fit in a
    /// byte, see [`crate::AllocatorConfig::validate`].
    pub(crate) fn encode(&self) -> [u8; HEADER_SIZE] {
        debug_assert!(self.size <= MAX_BLOCK_SIZE);

        [
            (self.size as u8) << 1 | self.free as u8,
            self.prev.unwrap_or(0) as u8,
        ]
    }

    /// Range of buffer addresses holding the payload.
    #[inline]
    pub fn payload(&self) -> std::ops::Range<usize> {
        let start = self.addr + HEADER_SIZE;
        start..start + self.size
    }
}

/// Derives where the block after `addr` starts. This is the only place the
/// successor of a block is computed, decoding and merging both go through it.
#[inline]
pub(crate) fn next_addr(
    addr: usize,
    size: usize,
    chunk_size: usize,
    capacity: usize,
) -> Option<usize> {
    let next = align(addr + HEADER_SIZE + size, chunk_size);

    (addr < next && next < capacity).then_some(next)
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.free { "free" } else { "used" };

        write!(f, "[{:>3} {} {:>3} ", self.addr, state, self.size)?;

        match self.prev {
            Some(prev) => write!(f, "{prev}")?,
            None => f.write_str("-")?,
        }
        f.write_str("->")?;
        match self.next {
            Some(next) => write!(f, "{next}]"),
            None => f.write_str("-]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_size_and_flag_in_one_byte() {
        let block = Block::new(16, 46, true, Some(8));

        assert_eq!(block.encode(), [46 << 1 | 1, 8]);
    }

    #[test]
    fn decode_derives_next() {
        let block = Block::decode(8, [1 << 1, 0], 8, 64);

        assert_eq!(block.size, 1);
        assert!(!block.free);
        assert_eq!(block.prev, Some(0));
        assert_eq!(block.next, Some(16));
    }

    #[test]
    fn first_block_has_no_prev() {
        let block = Block::decode(0, [62 << 1 | 1, 0], 8, 64);

        assert_eq!(block.prev, None);
        // The only block spans the whole buffer.
        assert_eq!(block.next, None);
    }

    #[test]
    fn zeroed_header_is_a_used_empty_block() {
        let block = Block::decode(24, [0, 0], 8, 64);

        assert!(!block.free);
        assert_eq!(block.size, 0);
        assert_eq!(block.prev, Some(0));
        assert_eq!(block.next, Some(32));
    }

    #[test]
    fn encode_then_decode_keeps_stored_fields() {
        let block = Block::new(32, MAX_BLOCK_SIZE, false, Some(24));
        let decoded = Block::decode(32, block.encode(), 8, 256);

        assert_eq!(decoded.size, MAX_BLOCK_SIZE);
        assert_eq!(decoded.prev, Some(24));
        assert!(!decoded.free);
    }

    #[test]
    fn next_is_clamped_to_the_buffer() {
        assert_eq!(next_addr(0, 1, 8, 64), Some(8));
        assert_eq!(next_addr(0, 6, 8, 64), Some(8));
        assert_eq!(next_addr(0, 7, 8, 64), Some(16));
        assert_eq!(next_addr(56, 6, 8, 64), None);
    }

    #[test]
    fn display_is_compact() {
        let block = Block {
            next: Some(16),
            ..Block::new(8, 6, true, Some(0))
        };

        assert_eq!(block.to_string(), "[  8 free   6 0->16]");
    }
}
