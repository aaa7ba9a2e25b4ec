use std::{ops::{Deref, DerefMut}, ptr::NonNull, slice};

use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{Error, Result},
    kernel::{page_size, request_memory, return_memory},
    utils::align,
};

/// Where the bytes of the allocator buffer live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backing {
    /// A regular `Vec<u8>` from the global allocator.
    #[default]
    Heap,
    /// Anonymous private pages requested from the kernel. See [`MappedRegion`].
    Mapped,
}

/// Pages obtained from the kernel through [`request_memory`].
///
/// The kernel gives us memory regions aligned to the computer page size,
/// so the mapping is usually larger than the buffer. Only the first `len`
/// bytes are visible, the rest is slack until the pages go back on drop.
///
/// ```text
/// +-------------------------------+-----------------+
/// |        buffer (`len`)         |      slack      |
/// +-------------------------------+-----------------+
/// ^                                                 ^
/// start                               start + mapped
/// ```
pub struct MappedRegion {
    /// Start direction of the region returned by the kernel.
    start: NonNull<u8>,
    /// Bytes exposed as the buffer.
    len: usize,
    /// Bytes actually mapped, a multiple of the page size.
    mapped: usize,
}

impl MappedRegion {
    /// Maps enough pages to hold `len` bytes. Fresh anonymous pages are
    /// zero filled by the kernel.
    pub fn new(len: usize) -> Result<Self> {
        let mapped = align(len.max(1), page_size());

        // SAFETY: `mapped` is a non zero multiple of the page size.
        let start = unsafe { request_memory(mapped) }.ok_or(Error::MapFailed { len: mapped })?;

        debug!(len, mapped, "mapped buffer pages");

        Ok(Self { start, len, mapped })
    }
}

impl Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: the mapping is readable, at least `len` bytes long and
        // lives until `self` is dropped.
        unsafe { slice::from_raw_parts(self.start.as_ptr(), self.len) }
    }
}

impl DerefMut for MappedRegion {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: same as `deref`, and `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.start.as_ptr(), self.len) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: the region came from `request_memory` with this size and no
        // slice into it can outlive `self`.
        unsafe { return_memory(self.start, self.mapped) }
    }
}

/// The buffer of the allocator, whatever its [`Backing`] is.
pub(crate) enum Memory {
    Heap(Vec<u8>),
    Mapped(MappedRegion),
}

impl Memory {
    /// Allocates a zero filled buffer of `len` bytes.
    pub fn new(backing: Backing, len: usize) -> Result<Self> {
        match backing {
            Backing::Heap => Ok(Self::Heap(vec![0; len])),
            Backing::Mapped => {
                let mut region = MappedRegion::new(len)?;
                region.fill(0);
                Ok(Self::Mapped(region))
            }
        }
    }
}

impl Deref for Memory {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Heap(bytes) => bytes.as_slice(),
            Self::Mapped(region) => &**region,
        }
    }
}

impl DerefMut for Memory {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Heap(bytes) => bytes.as_mut_slice(),
            Self::Mapped(region) => &mut **region,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_region_is_zeroed_and_writable() {
        let mut region = MappedRegion::new(64).unwrap();

        assert_eq!(region.len(), 64);
        assert!(region.iter().all(|&byte| byte == 0));

        region[0] = 23;
        region[63] = 45;
        assert_eq!(region[0], 23);
        assert_eq!(region[63], 45);
    }

    #[test]
    fn both_backings_expose_the_same_view() {
        for backing in [Backing::Heap, Backing::Mapped] {
            let mut memory = Memory::new(backing, 32).unwrap();

            assert_eq!(memory.len(), 32);
            memory[31] = 7;
            assert_eq!(memory[31], 7);
        }
    }
}
