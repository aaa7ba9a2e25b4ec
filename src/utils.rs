//! This file contains the helper functions for the allocator.
//! These are functions that don't particularly belong to any concrete module of the program.

/// It aligns `to_be_aligned` up to the next multiple of `alignment`.
///
/// This is used to round block boundaries to the allocator's chunk size and
/// platform mappings to the page size. The chunk size is user supplied and
/// doesn't need to be a power of two, so we can't use the usual bit mask trick
/// here and do a ceiling division instead.
#[inline]
pub fn align(to_be_aligned: usize, alignment: usize) -> usize {
    to_be_aligned.div_ceil(alignment) * alignment
}
