//! Stack allocator implementation
//!
//! Bump allocation over an owned byte buffer. Allocations are never freed one
//! by one; [`StackAllocator::reset`] drops all of them at once.
use alloc::{vec, vec::Vec};
use bytemuck::Pod;

use crate::{
    config::{DEFAULT_STACK_CAPACITY, StackConfig},
    error::{HeapError, Result},
    inspect::{Inspect, Region},
};

/// Handle returned by [`StackAllocator::push_or_sentinel`] when the push fails.
pub const STACK_FAILURE: usize = usize::MAX;

/// Bump allocator over a fixed-size byte buffer.
///
/// Handles are byte offsets into the buffer. There is no alignment guarantee.
pub struct StackAllocator {
    memory: Vec<u8>,
    top: usize,
    zero_on_reset: bool,
}

impl Default for StackAllocator {
    fn default() -> Self {
        Self {
            memory: vec![0; DEFAULT_STACK_CAPACITY],
            top: 0,
            zero_on_reset: false,
        }
    }
}

impl StackAllocator {
    /// Create a stack allocator.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidCapacity` if the capacity is zero
    pub fn new(config: StackConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(HeapError::InvalidCapacity);
        }

        tracing::debug!(capacity = config.capacity, "stack allocator initialized");

        Ok(Self {
            memory: vec![0; config.capacity],
            top: 0,
            zero_on_reset: config.zero_on_reset,
        })
    }

    /// Create a stack allocator of `capacity` bytes with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`StackAllocator::new`].
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(StackConfig::new(capacity))
    }

    /// Reserve `size` bytes on top of the stack.
    ///
    /// # Errors
    ///
    /// - `HeapError::OutOfMemory` if fewer than `size` bytes remain. Nothing is reserved.
    pub fn alloc(&mut self, size: usize) -> Result<&mut [u8]> {
        let start = self.top;
        let end = start
            .checked_add(size)
            .filter(|&end| end <= self.memory.len())
            .ok_or(HeapError::OutOfMemory)?;

        self.top = end;
        Ok(&mut self.memory[start..end])
    }

    /// Copy `bytes` on top of the stack and return their offset.
    ///
    /// # Errors
    ///
    /// - `HeapError::OutOfMemory` if `bytes` does not fit. Nothing is written.
    pub fn push(&mut self, bytes: &[u8]) -> Result<usize> {
        let handle = self.top;
        self.alloc(bytes.len())?.copy_from_slice(bytes);
        Ok(handle)
    }

    /// Like [`StackAllocator::push`], returning [`STACK_FAILURE`] on error.
    #[must_use]
    pub fn push_or_sentinel(&mut self, bytes: &[u8]) -> usize {
        self.push(bytes).unwrap_or(STACK_FAILURE)
    }

    /// Push the bytes of a plain-old-data value.
    ///
    /// # Errors
    ///
    /// See [`StackAllocator::push`].
    pub fn push_pod<T: Pod>(&mut self, value: &T) -> Result<usize> {
        self.push(bytemuck::bytes_of(value))
    }

    /// Read back a value pushed with [`StackAllocator::push_pod`].
    ///
    /// Reads are unaligned. Returns `None` if fewer than `size_of::<T>()` bytes
    /// are in use from `handle` on.
    #[must_use]
    pub fn read_pod<T: Pod>(&self, handle: usize) -> Option<T> {
        let bytes = self.at(handle)?.get(..size_of::<T>())?;
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }

    /// Bytes from `handle` up to the top of the stack.
    ///
    /// Allocation sizes are not recorded, so the slice covers every later
    /// allocation too.
    #[must_use]
    pub fn at(&self, handle: usize) -> Option<&[u8]> {
        if handle < self.top {
            Some(&self.memory[handle..self.top])
        } else {
            None
        }
    }

    #[must_use]
    pub fn at_mut(&mut self, handle: usize) -> Option<&mut [u8]> {
        if handle < self.top {
            Some(&mut self.memory[handle..self.top])
        } else {
            None
        }
    }

    /// Drop every allocation.
    pub fn reset(&mut self) {
        if self.zero_on_reset {
            self.memory[..self.top].fill(0);
        }
        self.top = 0;

        tracing::trace!("stack allocator reset");
    }

    #[must_use]
    #[inline]
    pub const fn top(&self) -> usize {
        self.top
    }

    #[must_use]
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.memory.len()
    }

    #[must_use]
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.memory.len() - self.top
    }

    /// The whole buffer, including the unused part.
    #[must_use]
    #[inline]
    pub fn storage(&self) -> &[u8] {
        &self.memory
    }
}

impl Inspect for StackAllocator {
    fn capacity(&self) -> usize {
        self.memory.len()
    }

    fn free_regions(&self) -> impl Iterator<Item = Region> + '_ {
        (self.top < self.memory.len())
            .then(|| Region::new(self.top, self.remaining()))
            .into_iter()
    }

    /// The used part of the buffer, as a single region.
    fn allocated_regions(&self) -> impl Iterator<Item = Region> + '_ {
        (self.top > 0).then(|| Region::new(0, self.top)).into_iter()
    }
}
