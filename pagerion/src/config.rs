//! Allocator configuration
//!
//! Every allocator takes a small configuration value. The defaults below are used
//! when an allocator is created with `Default`, or when a pool is lazily initialized
//! on first use.

/// Default number of elements in a page pool.
pub const DEFAULT_PAGE_CAPACITY: usize = 1 << 13;
/// Default size of a stack allocator, in bytes.
pub const DEFAULT_STACK_CAPACITY: usize = 1 << 14;
/// Default size of a buddy allocator, in bytes.
pub const DEFAULT_BUDDY_CAPACITY: usize = 4096 * 1024;
/// Default smallest block a buddy allocator will split down to, in bytes.
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Configuration of a [`PagePool`](crate::PagePool) or [`ObjectPool`](crate::ObjectPool).
pub struct PoolConfig {
    /// Number of elements used when the pool initializes itself lazily.
    pub capacity: usize,
    /// Reject capacities that are not a power of two.
    ///
    /// Ignored by [`ObjectPool`](crate::ObjectPool).
    pub require_power_of_two: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PAGE_CAPACITY,
            require_power_of_two: true,
        }
    }
}

impl PoolConfig {
    #[must_use]
    #[inline]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            require_power_of_two: true,
        }
    }

    #[must_use]
    #[inline]
    pub const fn require_power_of_two(mut self, require: bool) -> Self {
        self.require_power_of_two = require;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Configuration of a [`BuddyAllocator`](crate::BuddyAllocator).
pub struct BuddyConfig {
    /// Total size of the arena in bytes. Must be a power of two.
    pub capacity: usize,
    /// Blocks are never split below this size. Must be a power of two.
    pub min_block_size: usize,
}

impl Default for BuddyConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUDDY_CAPACITY,
            min_block_size: DEFAULT_MIN_BLOCK_SIZE,
        }
    }
}

impl BuddyConfig {
    #[must_use]
    #[inline]
    pub const fn new(capacity: usize, min_block_size: usize) -> Self {
        Self {
            capacity,
            min_block_size,
        }
    }

    /// Use `capacity / divisor` as the minimum block size.
    ///
    /// A `divisor` of zero yields a minimum block size of zero, which
    /// [`BuddyAllocator::new`](crate::BuddyAllocator::new) rejects.
    #[must_use]
    #[inline]
    pub const fn with_granularity(capacity: usize, divisor: usize) -> Self {
        let min_block_size = match capacity.checked_div(divisor) {
            Some(size) => size,
            None => 0,
        };
        Self {
            capacity,
            min_block_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Configuration of a [`StackAllocator`](crate::StackAllocator).
pub struct StackConfig {
    /// Size of the stack in bytes.
    pub capacity: usize,
    /// Zero the used part of the buffer on reset.
    pub zero_on_reset: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_STACK_CAPACITY,
            zero_on_reset: false,
        }
    }
}

impl StackConfig {
    #[must_use]
    #[inline]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            zero_on_reset: false,
        }
    }

    #[must_use]
    #[inline]
    pub const fn zero_on_reset(mut self, zero: bool) -> Self {
        self.zero_on_reset = zero;
        self
    }
}
