use std::iter::FusedIterator;

use crate::{block::Block, region::Region};

/// Iterator over the implicit list of blocks stored in a [`Region`].
///
/// There are no nodes to follow. Every step decodes the header at the
/// current address and moves to its derived `next`, until a block without a
/// successor is reached.
pub struct Blocks<'a> {
    region: &'a Region,
    current: Option<usize>,
}

impl<'a> Blocks<'a> {
    /// Walks the list starting from the block at `addr`.
    pub(crate) fn starting_at(region: &'a Region, addr: usize) -> Self {
        Self { region, current: Some(addr) }
    }
}

impl Iterator for Blocks<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        let addr = self.current?;
        let block = self.region.read_header(addr);

        self.current = block.next;

        Some(block)
    }
}

impl FusedIterator for Blocks<'_> {}
