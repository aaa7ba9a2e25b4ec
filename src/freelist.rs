use tracing::trace;

use crate::{
    block::Block,
    error::{Error, Result},
    list::Blocks,
    region::Region,
};

/// Returns the [`Block`] where we can allocate `size` bytes, searching the
/// list from the block at `start`.
///
/// This uses the first-fit algorithm, it returns the first free block that is
/// big enough. Free blocks are only identified by their [`Block::free`] flag,
/// there's no separate list of them to keep in sync, so the walk goes through
/// every block and is O(n) in their number.
///
/// ```text
///                  size = 8
///                     |
///     +-------+    +--v----+    +-------+    +----------+
///     | Block | -> | Free  | -> | Block | -> |   Free   |
///     |       |    |  (6)  |    |       |    |   (30)   |
///     +-------+    +-------+    +-------+    +----------+
///                   too small                 first fit
/// ```
pub(crate) fn find_free(region: &Region, size: usize, start: usize) -> Result<Block> {
    for block in Blocks::starting_at(region, start) {
        if block.free && size <= block.size {
            // We found a block that we can use
            return Ok(block);
        }

        trace!(addr = block.addr, free = block.free, size = block.size, "block doesn't fit");
    }

    // There is no free block we can use
    Err(Error::OutOfSpace { requested: size })
}
