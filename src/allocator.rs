use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    block::{Block, HEADER_SIZE},
    config::{AllocatorConfig, DEFAULT_CHUNK_SIZE},
    error::{Error, Result},
    freelist,
    list::Blocks,
    mmap::Memory,
    region::Region,
};

/// Block allocator over a single fixed size buffer.
///
/// Allocations are served first-fit from an implicit list of blocks whose
/// headers live inside the buffer (see [`Block`] for the header layout).
/// Allocating splits the chosen free block when the leftover is worth at least
/// one chunk, freeing merges the block with its free neighbours right away, so
/// two free blocks are never next to each other once a call returns.
///
/// ```text
/// allocate(1), allocate(1)
/// +--------+--------+--------------------------------+
/// | used 1 | used 1 |            free 46             |
/// +--------+--------+--------------------------------+
///
/// free(first)
/// +--------+--------+--------------------------------+
/// | free 6 | used 1 |            free 46             |
/// +--------+--------+--------------------------------+
///
/// free(second)
/// +--------------------------------------------------+
/// |                     free 62                      |
/// +--------------------------------------------------+
/// ```
///
/// Every operation taking a [`Block`] checks that the handle still names a
/// live block with the same state before touching the buffer, stale handles
/// and double frees are reported as [`Error::InvalidHandle`].
pub struct Allocator {
    region: Region,
}

/// Snapshot of how the buffer is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub capacity: usize,
    pub chunk_size: usize,
    /// Number of blocks in the list.
    pub blocks: usize,
    pub free_blocks: usize,
    /// Payload bytes handed out to callers.
    pub used_bytes: usize,
    /// Payload bytes available in free blocks.
    pub free_bytes: usize,
    /// Biggest request that would succeed right now.
    pub largest_free: usize,
}

impl Allocator {
    /// Creates an allocator over `capacity` bytes with the default chunk size.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_chunk_size(capacity, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(capacity: usize, chunk_size: usize) -> Result<Self> {
        Self::from_config(&AllocatorConfig::new(capacity, chunk_size))
    }

    /// Validates `config`, allocates a zero filled buffer and lays out a
    /// single free block spanning it.
    pub fn from_config(config: &AllocatorConfig) -> Result<Self> {
        config.validate()?;

        let memory = Memory::new(config.backing, config.capacity)?;
        let region = Region::new(memory, config.chunk_size);

        debug!(
            capacity = config.capacity,
            chunk_size = config.chunk_size,
            backing = ?config.backing,
            "allocator initialized"
        );

        Ok(Self { region })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.region.chunk_size()
    }

    /// Rounds `value` up to a multiple of the chunk size.
    #[inline]
    pub fn align_up(&self, value: usize) -> usize {
        self.region.align_up(value)
    }

    /// Decodes the header stored at `addr`.
    ///
    /// Nothing guarantees that a block starts there, only that the two header
    /// bytes are inside the buffer.
    pub fn read_header(&self, addr: usize) -> Result<Block> {
        let end = addr.checked_add(HEADER_SIZE);

        if end.is_none_or(|end| end > self.capacity()) {
            return Err(Error::InvalidHandle { addr });
        }

        Ok(self.region.read_header(addr))
    }

    /// First free block, in address order, that can hold `size` bytes.
    pub fn find_free(&self, size: usize) -> Result<Block> {
        freelist::find_free(&self.region, size, 0)
    }

    /// Same as [`Allocator::find_free`] but the search begins at `start`.
    pub fn find_free_from(&self, size: usize, start: &Block) -> Result<Block> {
        let start = self.locate(start)?;

        freelist::find_free(&self.region, size, start.addr)
    }

    /// Allocates a block with a payload of exactly `size` bytes.
    ///
    /// If the free block we take has at least one chunk left after the
    /// payload (aligned), the leftover becomes a new free block. Otherwise the
    /// allocated block keeps the slack and its derived `next` still lands on
    /// the block that followed the free one.
    pub fn allocate(&mut self, size: usize) -> Result<Block> {
        let found = freelist::find_free(&self.region, size, 0)?;

        let limit = found.next.unwrap_or(self.capacity());
        let next_addr = self.region.align_up(found.addr + HEADER_SIZE + size);

        if limit.saturating_sub(next_addr) >= self.chunk_size() {
            let leftover = limit - next_addr - HEADER_SIZE;
            let remainder = self
                .region
                .write_header(&Block::new(next_addr, leftover, true, Some(found.addr)));

            // The block after the old free one now follows the remainder.
            if let Some(after) = remainder.next {
                self.region.relink(after, remainder.addr);
            }

            trace!(addr = remainder.addr, size = remainder.size, "split free block");
        }

        let block = self.region.write_header(&Block {
            size,
            free: false,
            ..found
        });

        debug!(addr = block.addr, size, "allocated block");

        Ok(block)
    }

    /// Frees `block` and returns the free block it ended up in.
    ///
    /// The stored size is rounded up so the block spans whole chunks (one at
    /// least), then the block is merged with a free predecessor and a free
    /// successor. The merged payload is zero filled.
    ///
    /// Freeing a block that is already free, or that doesn't exist anymore,
    /// is rejected with [`Error::InvalidHandle`].
    pub fn free(&mut self, block: Block) -> Result<Block> {
        let mut block = self.locate(&block)?;

        if block.free {
            return Err(Error::InvalidHandle { addr: block.addr });
        }

        block.free = true;
        block.size = self.region.align_up(HEADER_SIZE + block.size) - HEADER_SIZE;

        self.region.merge_with_prev(&mut block);
        self.region.merge_with_next(&mut block);

        let block = self.region.write_header(&block);
        self.region.fill(&block, 0);

        debug!(addr = block.addr, size = block.size, "freed block");

        Ok(block)
    }

    /// Payload of `block`, `block.size` bytes long.
    pub fn read(&self, block: &Block) -> Result<&[u8]> {
        let block = self.locate(block)?;

        Ok(self.region.payload(&block))
    }

    /// Writes `bytes` at the END of the payload of `block`.
    ///
    /// Data is right aligned: the last `bytes.len()` payload bytes receive it
    /// and the leading `size - bytes.len()` bytes are left as they were. They
    /// are not zeroed here, only freeing clears a payload.
    ///
    /// ```text
    /// write(block, b"hi") on a block of 6 bytes
    /// +----+----+----+----+----+----+
    /// | ?? | ?? | ?? | ?? | h  | i  |
    /// +----+----+----+----+----+----+
    /// ```
    ///
    /// Data longer than the payload fails with [`Error::Overflow`] and nothing
    /// is written.
    pub fn write(&mut self, block: &Block, bytes: &[u8]) -> Result<()> {
        let block = self.locate(block)?;

        if bytes.len() > block.size {
            return Err(Error::Overflow { len: bytes.len(), size: block.size });
        }

        let start = block.size - bytes.len();
        self.region.payload_mut(&block)[start..].copy_from_slice(bytes);

        trace!(addr = block.addr, len = bytes.len(), "wrote block");

        Ok(())
    }

    /// Overwrites every payload byte of `block` with `value`.
    pub fn fill(&mut self, block: &Block, value: u8) -> Result<()> {
        let block = self.locate(block)?;

        self.region.fill(&block, value);

        Ok(())
    }

    /// Lazily walks the list of blocks in address order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks::starting_at(&self.region, 0)
    }

    /// Snapshot of every block, in address order.
    pub fn collect(&self) -> Vec<Block> {
        self.blocks().collect()
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            capacity: self.capacity(),
            chunk_size: self.chunk_size(),
            ..Stats::default()
        };

        for block in self.blocks() {
            stats.blocks += 1;

            if block.free {
                stats.free_blocks += 1;
                stats.free_bytes += block.size;
                stats.largest_free = stats.largest_free.max(block.size);
            } else {
                stats.used_bytes += block.size;
            }
        }

        stats
    }

    /// Finds the live block `handle` refers to and returns its current header.
    ///
    /// The handle is valid if a block starts at its address with the same
    /// size and free flag. `prev` may be outdated in a handle (a neighbour
    /// can move when it merges), so the header read from the buffer is the
    /// one to work with.
    fn locate(&self, handle: &Block) -> Result<Block> {
        self.blocks()
            .take_while(|block| block.addr <= handle.addr)
            .find(|block| block.addr == handle.addr)
            .filter(|block| block.size == handle.size && block.free == handle.free)
            .ok_or(Error::InvalidHandle { addr: handle.addr })
    }
}
