use tracing::trace;

use crate::{
    block::{self, Block, HEADER_SIZE},
    mmap::Memory,
    utils::align,
};

/// The byte buffer every block lives in, together with the chunk size its
/// block boundaries are rounded to.
///
/// There are no side tables. The blocks form a singly linked list whose
/// headers are embedded in the buffer itself, addresses are plain indices and
/// the link to the next block is derived from each header.
///
/// ```text
/// 0        8        16                      64
/// +--------+--------+------------------------+
/// | Block  | Block  |       Free Block       |
/// +--------+--------+------------------------+
///   |  ^     |  ^     |
///   +--+     +--+     +--> next = None (end of the buffer)
///   next     prev
/// ```
pub(crate) struct Region {
    /// Bytes of the buffer.
    memory: Memory,
    /// Granularity of block boundaries.
    chunk_size: usize,
}

impl Region {
    /// Takes ownership of `memory` and lays out a single free block spanning
    /// all of it.
    pub fn new(memory: Memory, chunk_size: usize) -> Self {
        let mut region = Self { memory, chunk_size };
        let size = region.capacity() - HEADER_SIZE;

        region.memory.fill(0);
        region.write_header(&Block::new(0, size, true, None));

        region
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Rounds `value` up to a multiple of the chunk size.
    #[inline]
    pub fn align_up(&self, value: usize) -> usize {
        align(value, self.chunk_size)
    }

    /// Where the block following a block at `addr` with `size` bytes starts.
    #[inline]
    pub fn next_addr(&self, addr: usize, size: usize) -> Option<usize> {
        block::next_addr(addr, size, self.chunk_size, self.capacity())
    }

    /// Decodes the header stored at `addr`. The caller guarantees there is
    /// room for a header there.
    pub fn read_header(&self, addr: usize) -> Block {
        let header = [self.memory[addr], self.memory[addr + 1]];

        Block::decode(addr, header, self.chunk_size, self.capacity())
    }

    /// Stores the header of `block` and returns what a later read will see,
    /// with `next` derived again from the committed fields.
    pub fn write_header(&mut self, block: &Block) -> Block {
        let header = block.encode();
        self.memory[block.addr..block.addr + HEADER_SIZE].copy_from_slice(&header);

        self.read_header(block.addr)
    }

    pub fn payload(&self, block: &Block) -> &[u8] {
        &self.memory[block.payload()]
    }

    pub fn payload_mut(&mut self, block: &Block) -> &mut [u8] {
        &mut self.memory[block.payload()]
    }

    /// Overwrites every payload byte of `block` with `value`.
    pub fn fill(&mut self, block: &Block, value: u8) {
        self.payload_mut(block).fill(value);
    }

    /// Points the `prev` link of the block at `addr` to `prev`.
    pub fn relink(&mut self, addr: usize, prev: usize) {
        let mut block = self.read_header(addr);
        block.prev = Some(prev);
        self.write_header(&block);
    }

    /// Tries to merge `block` with the previous one on the list. This can be
    /// performed if that previous block is free.
    ///
    /// The previous header is not touched. It ends up inside the payload of
    /// the merged block and is wiped once the merged block is committed and
    /// zero filled.
    pub fn merge_with_prev(&self, block: &mut Block) {
        let Some(prev_addr) = block.prev else {
            return;
        };

        let prev = self.read_header(prev_addr);

        if prev.free {
            trace!(addr = block.addr, prev = prev.addr, "merging with previous block");

            // We need to cover everything from the previous header up to ours.
            block.size += block.addr - prev.addr;
            block.addr = prev.addr;
            block.prev = prev.prev;
            block.next = self.next_addr(block.addr, block.size);
        }
    }

    /// Tries to merge `block` with the next one on the list. This can be
    /// performed if that next block is free.
    ///
    /// Whatever happens, the block that ends up following `block` gets its
    /// `prev` pointed at the current address of `block`, which may have moved
    /// after [`Region::merge_with_prev`].
    pub fn merge_with_next(&mut self, block: &mut Block) {
        let Some(next_addr) = self.next_addr(block.addr, block.size) else {
            block.next = None;
            return;
        };

        let next = self.read_header(next_addr);

        if next.free {
            trace!(addr = block.addr, next = next.addr, "merging with next block");

            // We need to cover the header and the actual content of the block
            block.size += HEADER_SIZE + next.size;

            if let Some(after) = next.next {
                self.relink(after, block.addr);
            }
        } else {
            self.relink(next.addr, block.addr);
        }

        block.next = self.next_addr(block.addr, block.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmap::{Backing, Memory};

    fn region(len: usize) -> Region {
        Region::new(Memory::new(Backing::Heap, len).unwrap(), 8)
    }

    #[test]
    fn new_region_is_one_free_block() {
        let region = region(64);
        let block = region.read_header(0);

        assert!(block.free);
        assert_eq!(block.size, 62);
        assert_eq!(block.prev, None);
        assert_eq!(block.next, None);
    }

    #[test]
    fn write_header_returns_committed_block() {
        let mut region = region(64);

        let block = region.write_header(&Block::new(0, 3, false, None));

        assert_eq!(block.next, Some(8));
        assert_eq!(region.read_header(0), block);
    }

    #[test]
    fn merge_with_free_prev_moves_the_block() {
        let mut region = region(64);
        region.write_header(&Block::new(0, 6, true, None));
        let mut block = region.write_header(&Block::new(8, 6, true, Some(0)));

        region.merge_with_prev(&mut block);

        assert_eq!(block.addr, 0);
        assert_eq!(block.size, 14);
        assert_eq!(block.prev, None);
        assert_eq!(block.next, Some(16));
    }

    #[test]
    fn merge_with_used_prev_does_nothing() {
        let mut region = region(64);
        region.write_header(&Block::new(0, 1, false, None));
        let mut block = region.write_header(&Block::new(8, 6, true, Some(0)));
        let before = block;

        region.merge_with_prev(&mut block);

        assert_eq!(block, before);
    }

    #[test]
    fn merge_with_free_next_relinks_the_one_after() {
        let mut region = region(64);
        let mut block = region.write_header(&Block::new(0, 6, true, None));
        region.write_header(&Block::new(8, 6, true, Some(0)));
        region.write_header(&Block::new(16, 46, false, Some(8)));

        region.merge_with_next(&mut block);

        assert_eq!(block.size, 14);
        assert_eq!(block.next, Some(16));
        assert_eq!(region.read_header(16).prev, Some(0));
    }

    #[test]
    fn used_next_is_relinked_to_the_block() {
        let mut region = region(64);
        region.write_header(&Block::new(0, 6, true, None));
        let mut block = region.write_header(&Block::new(8, 6, true, Some(0)));
        region.write_header(&Block::new(16, 46, false, Some(8)));

        region.merge_with_prev(&mut block);
        region.merge_with_next(&mut block);

        assert_eq!(block.addr, 0);
        assert_eq!(region.read_header(16).prev, Some(0));
    }
}
