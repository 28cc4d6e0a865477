//! # Pagerion: Fixed-Capacity `no_std` Allocators
//!
//! Pagerion provides a family of small allocators that each own their backing store
//! and hand out pieces of it. Every allocator is an explicit value: there are no
//! global instances.
//!
//! ## Allocators
//!
//! - **Page Pool** ([`PagePool`]): contiguous runs of `T` from a fixed array
//!   - First-fit allocation, carved from the front of the first fitting free region
//!   - Free regions are merged with their neighbours as soon as they are released
//!   - Free-list nodes come from a preallocated link arena
//!
//! - **Object Pool** ([`ObjectPool`]): single `T` slots, same free-region tracking
//!
//! - **Buddy Allocator** ([`BuddyAllocator`]): power-of-two blocks from a byte arena
//!   - Depth-first, left-first search with on-demand splitting
//!   - Single-level merge with the buddy on free
//!
//! - **Stack Allocator** ([`StackAllocator`]): bump allocation with bulk reset
//!
//! Every allocator implements [`Inspect`], a read-only view of its free and allocated
//! regions used by visualizers and by [`check_coverage`] / [`check_coalesced`].
//!
//! ## Usage
//!
//! ```rust
//! use pagerion::{PagePool, HeapError};
//!
//! let mut pool = PagePool::<i32>::with_capacity(16).unwrap();
//!
//! let a = pool.alloc(5).unwrap();
//! let b = pool.alloc(10).unwrap();
//! assert_eq!(pool.offset_of(b), Some(5));
//!
//! pool.free(a).unwrap();
//! assert_eq!(pool.free(a), Err(HeapError::DoubleFree));
//!
//! // The freed region is reused first
//! let c = pool.alloc(3).unwrap();
//! assert_eq!(c, a);
//! ```
//!
//! Errors carry stable negative status codes for callers that only deal in integers:
//!
//! ```rust
//! use pagerion::{HeapError, status_code};
//!
//! assert_eq!(status_code(Ok(())), 0);
//! assert_eq!(status_code(Err(HeapError::DoubleFree)), HeapError::DoubleFree.code());
//! ```
#![warn(clippy::pedantic, clippy::nursery)]
#![forbid(unsafe_code)]
#![no_std]

extern crate alloc;

mod alloc_map;
mod buddy;
mod config;
mod error;
mod inspect;
mod links;
mod object_pool;
mod pool;
mod stack;
mod utils;

// Public exports
pub use alloc_map::{AllocationMap, DenseAllocMap, SparseAllocMap};
pub use buddy::{Block, BuddyAllocator};
pub use config::{
    BuddyConfig, DEFAULT_BUDDY_CAPACITY, DEFAULT_MIN_BLOCK_SIZE, DEFAULT_PAGE_CAPACITY,
    DEFAULT_STACK_CAPACITY, PoolConfig, StackConfig,
};
pub use error::{HeapError, Result, status_code};
pub use inspect::{
    Inspect, LayoutViolation, Region, Usage, check_coalesced, check_coverage, usage,
};
pub use links::{FreeLink, Regions};
pub use object_pool::ObjectPool;
pub use pool::{PagePool, SparsePagePool};
pub use stack::{STACK_FAILURE, StackAllocator};
