//! # bufalloc - a heap allocator simulated over a byte buffer
//!
//! This crate emulates how a low level memory manager lays out allocation
//! headers, splits and coalesces free blocks and keeps writes inside their
//! blocks, all within a single fixed size buffer.
//!
//! ```text
//!   0        8        16               32                              64
//!   +--+-----+--+-----+--+-------------+--+----------------------------+
//!   |H | 1   |H | 1   |H |   8         |H |           30               |
//!   +--+-----+--+-----+--+-------------+--+----------------------------+
//!    ^        ^        ^                ^
//!    used     free     used             free
//!
//!   H = 2 byte header: size and free flag packed in one byte, prev address
//!       in the other. The next block is where the payload ends, aligned up
//!       to the chunk size.
//! ```
//!
//! The [`Allocator`] hands out [`Block`] values. They are plain copies of a
//! header, callers give them back to read, write, fill or free the block.
//!
//! ```rust
//! use bufalloc::{Allocator, Error};
//!
//! let mut allocator = Allocator::new(64)?;
//!
//! let block = allocator.allocate(6)?;
//! allocator.write(&block, b"hi")?;
//!
//! // Writes are right aligned inside the payload.
//! assert_eq!(allocator.read(&block)?, [0, 0, 0, 0, b'h', b'i']);
//!
//! allocator.free(block)?;
//! assert_eq!(allocator.collect().len(), 1);
//! # Ok::<(), Error>(())
//! ```
//!
//! There is no locking inside. Every mutation takes `&mut self`, so sharing
//! an allocator between threads needs an external lock around all of it.

mod allocator;
mod block;
mod config;
mod error;
mod freelist;
mod kernel;
mod list;
mod mmap;
mod region;
mod utils;

pub use allocator::{Allocator, Stats};
pub use block::{Block, HEADER_SIZE, MAX_BLOCK_SIZE};
pub use config::{AllocatorConfig, DEFAULT_CAPACITY, DEFAULT_CHUNK_SIZE, MAX_CAPACITY};
pub use error::{Error, Result};
pub use list::Blocks;
pub use mmap::{Backing, MappedRegion};
pub use utils::align;
