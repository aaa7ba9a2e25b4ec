//! Allocator configuration.

use serde::Deserialize;

use crate::{
    block::{HEADER_SIZE, MAX_BLOCK_SIZE},
    error::{Error, Result},
    mmap::Backing,
};

/// Default size of the buffer in bytes.
pub const DEFAULT_CAPACITY: usize = 64;

/// Default granularity block boundaries are rounded to.
pub const DEFAULT_CHUNK_SIZE: usize = 8;

/// Largest buffer the two byte header can address. The first block spans the
/// whole buffer, so its size must still fit in [`MAX_BLOCK_SIZE`].
pub const MAX_CAPACITY: usize = HEADER_SIZE + MAX_BLOCK_SIZE;

/// How to build an [`crate::Allocator`].
///
/// Every field is optional when deserializing:
///
/// ```toml
/// capacity = 128
/// chunk_size = 16
/// backing = "mapped"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorConfig {
    /// Size of the buffer in bytes.
    pub capacity: usize,
    /// Alignment granularity of block boundaries.
    pub chunk_size: usize,
    /// Where the buffer bytes come from.
    pub backing: Backing,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            backing: Backing::Heap,
        }
    }
}

impl AllocatorConfig {
    pub fn new(capacity: usize, chunk_size: usize) -> Self {
        Self { capacity, chunk_size, ..Self::default() }
    }

    pub fn with_backing(mut self, backing: Backing) -> Self {
        self.backing = backing;
        self
    }

    /// Parses a configuration from TOML. The result is not validated yet.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Checks that every header the allocator could write round-trips through
    /// its single bytes, and that block boundaries land on the chunk grid.
    ///
    /// A capacity that isn't a multiple of the chunk size would leave a tail
    /// smaller than a chunk whose derived address still falls inside the
    /// buffer, so it's rejected along with the rest.
    pub fn validate(&self) -> Result<()> {
        let Self { capacity, chunk_size, .. } = *self;

        if chunk_size < HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "chunk size {chunk_size} can't hold a {HEADER_SIZE} byte header"
            )));
        }

        if capacity < chunk_size {
            return Err(Error::InvalidConfig(format!(
                "capacity {capacity} is smaller than one chunk of {chunk_size} bytes"
            )));
        }

        if capacity % chunk_size != 0 {
            return Err(Error::InvalidConfig(format!(
                "capacity {capacity} is not a multiple of the chunk size {chunk_size}"
            )));
        }

        if capacity > MAX_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "capacity {capacity} exceeds the {MAX_CAPACITY} bytes a block header can describe"
            )));
        }

        Ok(())
    }
}
