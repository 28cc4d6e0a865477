//! Single-object pool
//!
//! A pool that only ever hands out one element at a time. Since every
//! allocation has the same length, no allocation map is needed: any slot that
//! is not inside a free region is live.
use core::ptr::NonNull;

use alloc::vec::Vec;

use crate::{
    config::PoolConfig,
    error::{HeapError, Result},
    inspect::{Inspect, Region},
    links::{FreeLink, FreeList, Regions},
    utils::element_offset,
};

/// Fixed-capacity pool of single `T` slots.
///
/// Capacities do not need to be a power of two.
pub struct ObjectPool<T> {
    storage: Vec<T>,
    free_list: FreeList,
    config: PoolConfig,
    capacity: usize,
    initialized: bool,
}

impl<T: Default> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> ObjectPool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    #[must_use]
    pub const fn with_config(config: PoolConfig) -> Self {
        Self {
            storage: Vec::new(),
            free_list: FreeList::new(),
            config,
            capacity: 0,
            initialized: false,
        }
    }

    /// Create a pool and initialize it with `capacity` slots.
    ///
    /// # Errors
    ///
    /// See [`ObjectPool::initialize`].
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut pool = Self::new();
        pool.initialize(capacity)?;
        Ok(pool)
    }

    /// Allocate the backing store and mark every slot as free.
    ///
    /// # Errors
    ///
    /// - `HeapError::AlreadyInitialized` if the pool is already initialized
    /// - `HeapError::InvalidCapacity` if `capacity` is zero
    /// - `HeapError::InvalidSize` if `T` is zero-sized
    pub fn initialize(&mut self, capacity: usize) -> Result<()> {
        if self.initialized {
            return Err(HeapError::AlreadyInitialized);
        }
        if size_of::<T>() == 0 {
            return Err(HeapError::InvalidSize);
        }
        if capacity == 0 {
            return Err(HeapError::InvalidCapacity);
        }

        let mut storage = Vec::with_capacity(capacity);
        storage.resize_with(capacity, T::default);

        self.storage = storage;
        self.free_list = FreeList::with_capacity(capacity);
        self.capacity = capacity;
        self.initialized = true;

        tracing::debug!(capacity, element_size = size_of::<T>(), "object pool initialized");

        Ok(())
    }

    /// Allocate one slot, the lowest free one.
    ///
    /// # Errors
    ///
    /// - `HeapError::OutOfMemory` if every slot is in use
    /// - any error of [`ObjectPool::initialize`] if lazy initialization fails
    pub fn alloc(&mut self) -> Result<NonNull<T>> {
        if !self.initialized {
            tracing::debug!(
                capacity = self.config.capacity,
                "object pool used before initialization, using configured capacity"
            );
            self.initialize(self.config.capacity)?;
        }

        let offset = self
            .free_list
            .take_first_fit(1)
            .ok_or(HeapError::OutOfMemory)?;

        Ok(NonNull::from(&mut self.storage[offset]))
    }
}

impl<T> ObjectPool<T> {
    /// Return a slot to the pool.
    ///
    /// # Errors
    ///
    /// - `HeapError::NotInitialized` if the pool is not initialized
    /// - `HeapError::InvalidPointer` if `ptr` is not a slot of this pool
    /// - `HeapError::DoubleFree` if the slot is already free
    pub fn free(&mut self, ptr: NonNull<T>) -> Result<()> {
        if !self.initialized {
            return Err(HeapError::NotInitialized);
        }
        let offset = self.offset_of(ptr).ok_or(HeapError::InvalidPointer)?;

        self.free_list.release(offset, 1)
    }

    /// Drop the backing store and return to the uninitialized state.
    pub fn reset(&mut self) {
        self.storage = Vec::new();
        self.free_list.clear();
        self.capacity = 0;
        self.initialized = false;

        tracing::trace!("object pool reset");
    }

    #[must_use]
    pub fn offset_of(&self, ptr: NonNull<T>) -> Option<usize> {
        element_offset(self.storage.as_ptr(), self.capacity, ptr.as_ptr())
    }

    /// Whether the slot at `offset` is currently handed out.
    #[must_use]
    pub fn is_allocated(&self, offset: usize) -> bool {
        offset < self.capacity && !self.free_list.contains(offset)
    }

    #[must_use]
    pub fn get(&self, ptr: NonNull<T>) -> Option<&T> {
        let offset = self.offset_of(ptr)?;
        if self.is_allocated(offset) {
            Some(&self.storage[offset])
        } else {
            None
        }
    }

    #[must_use]
    pub fn get_mut(&mut self, ptr: NonNull<T>) -> Option<&mut T> {
        let offset = self.offset_of(ptr)?;
        if self.is_allocated(offset) {
            Some(&mut self.storage[offset])
        } else {
            None
        }
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
    pub fn free_count(&self) -> usize {
        self.free_list.free_total()
    }

    #[must_use]
    #[inline]
    pub fn allocated_count(&self) -> usize {
        self.capacity - self.free_count()
    }

    #[must_use]
    #[inline]
    pub fn storage(&self) -> &[T] {
        &self.storage
    }

    #[must_use]
    #[inline]
    pub fn free_links(&self) -> &[FreeLink] {
        self.free_list.links()
    }

    #[must_use]
    #[inline]
    pub const fn free_list_head(&self) -> Option<usize> {
        self.free_list.head()
    }

    #[must_use]
    #[inline]
    pub fn free_regions(&self) -> Regions<'_> {
        self.free_list.iter()
    }
}

impl<T> Inspect for ObjectPool<T> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn free_regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.free_list.iter()
    }

    /// Every slot between two free regions, one region per slot.
    fn allocated_regions(&self) -> impl Iterator<Item = Region> + '_ {
        let ends = self
            .free_list
            .iter()
            .map(|region| region.offset)
            .chain(core::iter::once(self.capacity));
        let starts = core::iter::once(0).chain(self.free_list.iter().map(|region| region.end()));

        starts
            .zip(ends)
            .flat_map(|(start, end)| (start..end).map(|offset| Region::new(offset, 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{check_coalesced, check_coverage, usage};
    use alloc::vec::Vec;

    #[test]
    fn test_object_pool_init() {
        let mut pool = ObjectPool::<u64>::new();
        assert_eq!(pool.initialize(0), Err(HeapError::InvalidCapacity));

        pool.initialize(10).unwrap();
        assert_eq!(pool.capacity(), 10);
        assert_eq!(pool.free_links().len(), 6);
        assert_eq!(pool.initialize(10), Err(HeapError::AlreadyInitialized));
    }

    #[test]
    fn test_object_pool_alloc_free() {
        let mut pool = ObjectPool::<u64>::with_capacity(4).unwrap();

        let slots: Vec<_> = (0..4).map(|_| pool.alloc().unwrap()).collect();
        for (index, &slot) in slots.iter().enumerate() {
            assert_eq!(pool.offset_of(slot), Some(index));
        }
        assert_eq!(pool.alloc(), Err(HeapError::OutOfMemory));
        assert_eq!(pool.free_list_head(), None);

        pool.free(slots[2]).unwrap();
        assert_eq!(pool.alloc().unwrap(), slots[2]);

        for &slot in &slots {
            pool.free(slot).unwrap();
        }
        let regions: Vec<_> = pool.free_regions().collect();
        assert_eq!(regions, [Region::new(0, 4)]);
    }

    #[test]
    fn test_object_pool_free_errors() {
        let mut pool = ObjectPool::<u32>::with_capacity(8).unwrap();
        let a = pool.alloc().unwrap();

        assert_eq!(pool.free(NonNull::from(&mut 7u32)), Err(HeapError::InvalidPointer));

        let misaligned = a.cast::<u8>().map_addr(|addr| addr.saturating_add(1)).cast::<u32>();
        assert_eq!(pool.free(misaligned), Err(HeapError::InvalidPointer));

        pool.free(a).unwrap();
        assert_eq!(pool.free(a), Err(HeapError::DoubleFree));

        let never_allocated = a.map_addr(|addr| addr.saturating_add(3 * size_of::<u32>()));
        assert_eq!(pool.free(never_allocated), Err(HeapError::DoubleFree));
    }

    #[test]
    fn test_object_pool_uninitialized() {
        let mut pool = ObjectPool::<u32>::new();
        assert_eq!(pool.free(NonNull::from(&mut 0u32)), Err(HeapError::NotInitialized));

        let slot = pool.alloc().unwrap();
        assert!(pool.is_initialized());
        assert_eq!(pool.capacity(), crate::config::DEFAULT_PAGE_CAPACITY);
        assert_eq!(pool.offset_of(slot), Some(0));

        pool.reset();
        assert!(!pool.is_initialized());
        assert!(pool.storage().is_empty());
        assert_eq!(pool.get(slot), None);
    }

    #[test]
    fn test_object_pool_rejects_zero_sized_elements() {
        let mut pool = ObjectPool::<()>::new();
        assert_eq!(pool.initialize(4), Err(HeapError::InvalidSize));
        assert_eq!(pool.alloc(), Err(HeapError::InvalidSize));
        assert!(!pool.is_initialized());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_object_pool_get() {
        let mut pool = ObjectPool::<u32>::with_capacity(3).unwrap();
        let a = pool.alloc().unwrap();
        *pool.get_mut(a).unwrap() = 42;
        assert_eq!(pool.get(a), Some(&42));

        pool.free(a).unwrap();
        assert_eq!(pool.get(a), None);
    }

    #[test]
    fn test_object_pool_inspect() {
        let mut pool = ObjectPool::<u16>::with_capacity(7).unwrap();
        let slots: Vec<_> = (0..7).map(|_| pool.alloc().unwrap()).collect();

        for &slot in slots.iter().step_by(2) {
            pool.free(slot).unwrap();
        }
        assert_eq!(check_coverage(&pool), Ok(()));
        assert_eq!(check_coalesced(&pool), Ok(()));

        let usage = usage(&pool);
        assert_eq!(usage.free, 4);
        assert_eq!(usage.allocated, 3);
        assert_eq!(usage.free_regions, 4);
        assert_eq!(pool.allocated_count(), 3);
        assert!(pool.is_allocated(1));
        assert!(!pool.is_allocated(2));
        assert!(!pool.is_allocated(7));
    }
}
