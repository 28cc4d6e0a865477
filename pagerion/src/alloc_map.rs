//! Allocation records for the page pool
//!
//! A page pool only gets a pointer back on `free`, so it has to remember how
//! many elements were handed out at each offset. Two layouts are provided:
//!
//! - [`DenseAllocMap`]: one entry per element of the store, O(1) lookup.
//! - [`SparseAllocMap`]: a hash map holding live allocations only.
use alloc::vec::Vec;
use core::num::NonZeroUsize;
use hashbrown::HashMap;

use crate::inspect::Region;

/// Offset to length mapping of live allocations.
pub trait AllocationMap: Default {
    /// Drop every record and size the map for a store of `capacity` elements.
    fn reset_for(&mut self, capacity: usize);

    /// Release the map's storage.
    fn clear(&mut self);

    /// Record an allocation of `len` elements at `offset`.
    fn insert(&mut self, offset: usize, len: NonZeroUsize);

    /// Length of the allocation starting at `offset`.
    fn get(&self, offset: usize) -> Option<NonZeroUsize>;

    /// Remove and return the record at `offset`.
    fn remove(&mut self, offset: usize) -> Option<NonZeroUsize>;

    /// Number of live allocations.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live allocations, in no particular order.
    fn iter(&self) -> impl Iterator<Item = Region> + '_;
}

#[derive(Debug, Default, Clone)]
/// Allocation map with one slot per element of the store.
pub struct DenseAllocMap {
    lengths: Vec<Option<NonZeroUsize>>,
    live: usize,
}

impl DenseAllocMap {
    /// The raw per-element table.
    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[Option<NonZeroUsize>] {
        &self.lengths
    }
}

impl AllocationMap for DenseAllocMap {
    fn reset_for(&mut self, capacity: usize) {
        self.lengths.clear();
        self.lengths.resize(capacity, None);
        self.live = 0;
    }

    fn clear(&mut self) {
        self.lengths = Vec::new();
        self.live = 0;
    }

    fn insert(&mut self, offset: usize, len: NonZeroUsize) {
        let slot = &mut self.lengths[offset];
        debug_assert!(slot.is_none());
        *slot = Some(len);
        self.live += 1;
    }

    fn get(&self, offset: usize) -> Option<NonZeroUsize> {
        self.lengths.get(offset).copied().flatten()
    }

    fn remove(&mut self, offset: usize) -> Option<NonZeroUsize> {
        let len = self.lengths.get_mut(offset)?.take()?;
        self.live -= 1;
        Some(len)
    }

    fn len(&self) -> usize {
        self.live
    }

    fn iter(&self) -> impl Iterator<Item = Region> + '_ {
        self.lengths
            .iter()
            .enumerate()
            .filter_map(|(offset, len)| len.map(|len| Region::new(offset, len.get())))
    }
}

#[derive(Debug, Default, Clone)]
/// Allocation map that only stores live allocations.
pub struct SparseAllocMap {
    records: HashMap<usize, NonZeroUsize>,
}

impl AllocationMap for SparseAllocMap {
    fn reset_for(&mut self, _capacity: usize) {
        self.records.clear();
    }

    fn clear(&mut self) {
        self.records = HashMap::new();
    }

    fn insert(&mut self, offset: usize, len: NonZeroUsize) {
        let previous = self.records.insert(offset, len);
        debug_assert!(previous.is_none());
    }

    fn get(&self, offset: usize) -> Option<NonZeroUsize> {
        self.records.get(&offset).copied()
    }

    fn remove(&mut self, offset: usize) -> Option<NonZeroUsize> {
        self.records.remove(&offset)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn iter(&self) -> impl Iterator<Item = Region> + '_ {
        self.records
            .iter()
            .map(|(&offset, len)| Region::new(offset, len.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    fn exercise<M: AllocationMap>() {
        let mut map = M::default();
        map.reset_for(16);
        assert!(map.is_empty());

        map.insert(0, nz(5));
        map.insert(5, nz(10));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(0), Some(nz(5)));
        assert_eq!(map.get(5), Some(nz(10)));
        assert_eq!(map.get(1), None);
        assert_eq!(map.get(100), None);

        let mut regions: Vec<Region> = map.iter().collect();
        regions.sort_unstable();
        assert_eq!(regions, [Region::new(0, 5), Region::new(5, 10)]);

        assert_eq!(map.remove(0), Some(nz(5)));
        assert_eq!(map.remove(0), None);
        assert_eq!(map.remove(100), None);
        assert_eq!(map.len(), 1);

        map.reset_for(16);
        assert!(map.is_empty());
        assert_eq!(map.get(5), None);

        map.insert(3, nz(1));
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
    }

    #[test]
    fn test_dense_map() {
        exercise::<DenseAllocMap>();
    }

    #[test]
    fn test_sparse_map() {
        exercise::<SparseAllocMap>();
    }

    #[test]
    fn test_dense_iter_is_ordered() {
        let mut map = DenseAllocMap::default();
        map.reset_for(8);
        map.insert(6, nz(2));
        map.insert(1, nz(3));
        let regions: Vec<Region> = map.iter().collect();
        assert_eq!(regions, [Region::new(1, 3), Region::new(6, 2)]);
        assert_eq!(map.as_slice().len(), 8);
    }
}
