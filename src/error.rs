//! Error types of the allocator.

use thiserror::Error;

/// Everything that can go wrong while talking to an [`crate::Allocator`].
///
/// None of these are retried internally. The allocator reports the condition
/// and leaves the buffer as it was before the failing call.
#[derive(Error, Debug)]
pub enum Error {
    /// No free block in the list is large enough for the request.
    #[error("out of space: no free block can hold {requested} bytes")]
    OutOfSpace { requested: usize },

    /// The data doesn't fit in the payload of the target block.
    #[error("overflow: {len} bytes don't fit in a block of {size} bytes")]
    Overflow { len: usize, size: usize },

    /// The handle doesn't name a live block. It may be stale (the block was
    /// merged away), already freed, or it never came from this allocator.
    #[error("invalid block handle at address {addr}")]
    InvalidHandle { addr: usize },

    /// Construction parameters that the header encoding can't represent.
    #[error("invalid allocator configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse allocator configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read allocator configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The operating system refused to map memory for the buffer.
    #[error("platform refused to map {len} bytes")]
    MapFailed { len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
