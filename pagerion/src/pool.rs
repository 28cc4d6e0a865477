//! Page pool implementation
//!
//! A page pool owns a fixed array of `T` and hands out contiguous runs of
//! elements from it. Free space is tracked as an address-ordered list of
//! `(offset, len)` regions:
//!
//! - **Allocation** walks the list and carves the request from the front of the
//!   first region that is large enough (first-fit).
//! - **Deallocation** looks the length up in the allocation map, then puts the
//!   range back into the list, merging it with the regions on either side.
//!
//! Both operations are linear in the number of free regions, never in the number
//! of live allocations.
use core::num::NonZeroUsize;
use core::ptr::NonNull;

use alloc::vec::Vec;

use crate::{
    alloc_map::{AllocationMap, DenseAllocMap, SparseAllocMap},
    config::PoolConfig,
    error::{HeapError, Result},
    inspect::{Inspect, Region},
    links::{FreeLink, FreeList, Regions},
    utils::element_offset,
};

/// Fixed-capacity pool of `T` with first-fit allocation and eager coalescing.
///
/// The pool starts uninitialized unless built with [`PagePool::with_capacity`].
/// The first [`alloc`](PagePool::alloc) on an uninitialized pool initializes it
/// with the capacity from its [`PoolConfig`].
pub struct PagePool<T, M: AllocationMap = DenseAllocMap> {
    /// Backing store
    storage: Vec<T>,
    /// Offset to length of every live allocation
    alloc_map: M,
    /// Free regions
    free_list: FreeList,
    config: PoolConfig,
    capacity: usize,
    initialized: bool,
}

/// A page pool keeping its allocation records in a hash map.
pub type SparsePagePool<T> = PagePool<T, SparseAllocMap>;

impl<T: Default, M: AllocationMap> Default for PagePool<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default, M: AllocationMap> PagePool<T, M> {
    /// Create an uninitialized pool with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create an uninitialized pool.
    #[must_use]
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            storage: Vec::new(),
            alloc_map: M::default(),
            free_list: FreeList::new(),
            config,
            capacity: 0,
            initialized: false,
        }
    }

    /// Create a pool and initialize it with room for `capacity` elements.
    ///
    /// # Errors
    ///
    /// See [`PagePool::initialize`].
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut pool = Self::new();
        pool.initialize(capacity)?;
        Ok(pool)
    }

    /// Allocate the backing store and mark the whole pool as free.
    ///
    /// # Errors
    ///
    /// - `HeapError::AlreadyInitialized` if the pool is already initialized
    /// - `HeapError::InvalidCapacity` if `capacity` is zero
    /// - `HeapError::CapacityNotPowerOfTwo` if the configuration requires a power of two
    /// - `HeapError::InvalidSize` if `T` is zero-sized
    pub fn initialize(&mut self, capacity: usize) -> Result<()> {
        if self.initialized {
            return Err(HeapError::AlreadyInitialized);
        }
        // Zero-sized elements share one address and could never be freed
        if size_of::<T>() == 0 {
            return Err(HeapError::InvalidSize);
        }
        if capacity == 0 {
            return Err(HeapError::InvalidCapacity);
        }
        if self.config.require_power_of_two && !capacity.is_power_of_two() {
            return Err(HeapError::CapacityNotPowerOfTwo);
        }

        let mut storage = Vec::with_capacity(capacity);
        storage.resize_with(capacity, T::default);

        self.storage = storage;
        self.alloc_map.reset_for(capacity);
        self.free_list = FreeList::with_capacity(capacity);
        self.capacity = capacity;
        self.initialized = true;

        tracing::debug!(capacity, element_size = size_of::<T>(), "page pool initialized");

        Ok(())
    }

    /// Allocate `count` contiguous elements.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidSize` if `count` is zero or larger than the capacity
    /// - `HeapError::OutOfMemory` if no free region is large enough
    /// - any error of [`PagePool::initialize`] if lazy initialization fails
    pub fn alloc(&mut self, count: usize) -> Result<NonNull<T>> {
        if !self.initialized {
            tracing::debug!(
                capacity = self.config.capacity,
                "page pool used before initialization, using configured capacity"
            );
            self.initialize(self.config.capacity)?;
        }

        let len = NonZeroUsize::new(count)
            .filter(|len| len.get() <= self.capacity)
            .ok_or(HeapError::InvalidSize)?;

        let offset = self
            .free_list
            .take_first_fit(count)
            .ok_or(HeapError::OutOfMemory)?;
        self.alloc_map.insert(offset, len);

        Ok(NonNull::from(&mut self.storage[offset..offset + count]).cast())
    }
}

impl<T, M: AllocationMap> PagePool<T, M> {
    /// Return an allocation to the pool.
    ///
    /// # Errors
    ///
    /// - `HeapError::NotInitialized` if the pool is not initialized
    /// - `HeapError::InvalidPointer` if `ptr` is not the start of a live allocation
    /// - `HeapError::DoubleFree` if `ptr` points into space that is already free
    ///
    /// The pool is left untouched on error.
    pub fn free(&mut self, ptr: NonNull<T>) -> Result<()> {
        if !self.initialized {
            return Err(HeapError::NotInitialized);
        }
        let offset = self.offset_of(ptr).ok_or(HeapError::InvalidPointer)?;

        let Some(len) = self.alloc_map.get(offset) else {
            return Err(if self.free_list.contains(offset) {
                HeapError::DoubleFree
            } else {
                HeapError::InvalidPointer
            });
        };

        self.free_list.release(offset, len.get())?;
        self.alloc_map.remove(offset);

        Ok(())
    }

    /// Drop the backing store and return to the uninitialized state.
    pub fn reset(&mut self) {
        self.storage = Vec::new();
        self.alloc_map.clear();
        self.free_list.clear();
        self.capacity = 0;
        self.initialized = false;

        tracing::trace!("page pool reset");
    }

    /// Element offset of `ptr` within the backing store.
    #[must_use]
    pub fn offset_of(&self, ptr: NonNull<T>) -> Option<usize> {
        element_offset(self.storage.as_ptr(), self.capacity, ptr.as_ptr())
    }

    /// Number of elements in the allocation starting at `ptr`.
    #[must_use]
    pub fn allocation_len(&self, ptr: NonNull<T>) -> Option<usize> {
        let offset = self.offset_of(ptr)?;
        self.alloc_map.get(offset).map(NonZeroUsize::get)
    }

    /// The elements of the live allocation starting at `ptr`.
    #[must_use]
    pub fn get(&self, ptr: NonNull<T>) -> Option<&[T]> {
        let offset = self.offset_of(ptr)?;
        let len = self.alloc_map.get(offset)?.get();
        Some(&self.storage[offset..offset + len])
    }

    /// The elements of the live allocation starting at `ptr`.
    #[must_use]
    pub fn get_mut(&mut self, ptr: NonNull<T>) -> Option<&mut [T]> {
        let offset = self.offset_of(ptr)?;
        let len = self.alloc_map.get(offset)?.get();
        Some(&mut self.storage[offset..offset + len])
    }

    #[must_use]
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    #[inline]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    #[inline]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of live allocations.
    #[must_use]
    #[inline]
    pub fn allocated_count(&self) -> usize {
        self.alloc_map.len()
    }

    /// Number of free elements, across all free regions.
    #[must_use]
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_list.free_total()
    }

    /// The backing store.
    #[must_use]
    #[inline]
    pub fn storage(&self) -> &[T] {
        &self.storage
    }

    /// The raw free-region link arena.
    #[must_use]
    #[inline]
    pub fn free_links(&self) -> &[FreeLink] {
        self.free_list.links()
    }

    /// Index of the first free-region link.
    #[must_use]
    #[inline]
    pub const fn free_list_head(&self) -> Option<usize> {
        self.free_list.head()
    }

    /// Free regions in ascending offset order.
    #[must_use]
    #[inline]
    pub fn free_regions(&self) -> Regions<'_> {
        self.free_list.iter()
    }

    #[must_use]
    #[inline]
    pub const fn alloc_map(&self) -> &M {
        &self.alloc_map
    }
}

impl<T, M: AllocationMap> Inspect for PagePool<T, M> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn free_regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.free_list.iter()
    }

    fn allocated_regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.alloc_map.iter()
    }
}
