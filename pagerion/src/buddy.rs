//! Buddy allocator implementation
//!
//! The buddy allocator manages a power-of-two sized byte arena as a complete binary
//! tree of blocks. Every node is either a leaf, which is free or handed out as a
//! whole, or split into two halves ("buddies").
//!
//! Nodes live in a flat array: the children of node `i` are `2i + 1` and `2i + 2`.
//! Only nodes below a chain of split ancestors are part of the tree; the others keep
//! their geometry but are otherwise ignored.
//!
//! Allocation is a depth-first, left-first search for the first free leaf that is
//! large enough, splitting it while the halves would still fit the request and stay
//! above the minimum block size. Freeing a block merges it with its buddy, one level
//! only: merging never walks further up the tree.
use core::ptr::NonNull;

use alloc::{vec, vec::Vec};

use crate::{
    config::BuddyConfig,
    error::{HeapError, Result},
    inspect::{Inspect, Region},
    utils::{element_offset, left_child, parent, right_child, split_levels, tree_node_count},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A node of the buddy tree.
pub struct Block {
    /// Start of the block in the arena, in bytes
    pub offset: usize,
    /// Size of the block in bytes, always a power of two
    pub size: usize,
    /// Whether the block can be handed out. Only meaningful for leaves.
    pub is_free: bool,
    /// Whether the block has been split into two children
    pub split: bool,
}

impl Block {
    #[must_use]
    #[inline]
    pub const fn region(&self) -> Region {
        Region::new(self.offset, self.size)
    }
}

/// Binary buddy allocator over an owned byte arena.
pub struct BuddyAllocator {
    memory: Vec<u8>,
    blocks: Vec<Block>,
    min_block_size: usize,
}

impl BuddyAllocator {
    /// Create a new buddy allocator with a single free block spanning the arena.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidCapacity` if the capacity is zero
    /// - `HeapError::CapacityNotPowerOfTwo` if the capacity is not a power of two
    /// - `HeapError::InvalidMinBlockSize` if the minimum block size is zero, not a power
    ///   of two, or larger than the capacity
    pub fn new(config: BuddyConfig) -> Result<Self> {
        let BuddyConfig {
            capacity,
            min_block_size,
        } = config;

        if capacity == 0 {
            return Err(HeapError::InvalidCapacity);
        }
        if !capacity.is_power_of_two() {
            return Err(HeapError::CapacityNotPowerOfTwo);
        }
        if !min_block_size.is_power_of_two() || min_block_size > capacity {
            return Err(HeapError::InvalidMinBlockSize);
        }

        let levels = split_levels(capacity, min_block_size);
        let node_count = tree_node_count(levels);

        let blocks = (0..node_count)
            .map(|index| {
                let depth = (index + 1).ilog2();
                let size = capacity >> depth;
                let position = index + 1 - (1 << depth);
                Block {
                    offset: position * size,
                    size,
                    is_free: true,
                    split: false,
                }
            })
            .collect();

        tracing::debug!(
            capacity,
            min_block_size,
            levels,
            node_count,
            "buddy allocator initialized"
        );

        Ok(Self {
            memory: vec![0; capacity],
            blocks,
            min_block_size,
        })
    }

    /// Allocate a block of at least `size` bytes.
    ///
    /// The returned block is the smallest one the search reaches, which can be up to
    /// twice as large as requested.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidSize` if `size` is zero
    /// - `HeapError::OutOfMemory` if no free block is large enough
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>> {
        if size == 0 {
            return Err(HeapError::InvalidSize);
        }

        let index = self.find_block(0, size).ok_or(HeapError::OutOfMemory)?;
        let Block { offset, size, .. } = self.blocks[index];

        Ok(NonNull::from(&mut self.memory[offset..offset + size]).cast())
    }

    /// Return a block to the allocator.
    ///
    /// # Errors
    ///
    /// - `HeapError::InvalidPointer` if `ptr` is outside the arena or not the start of a block
    /// - `HeapError::DoubleFree` if the block is already free
    pub fn free(&mut self, ptr: NonNull<u8>) -> Result<()> {
        let offset = self.offset_of(ptr).ok_or(HeapError::InvalidPointer)?;
        let index = self.leaf_at(offset);

        let block = &mut self.blocks[index];
        if block.offset != offset {
            return Err(HeapError::InvalidPointer);
        }
        if block.is_free {
            return Err(HeapError::DoubleFree);
        }
        block.is_free = true;

        if let Some(parent) = parent(index) {
            let left = self.blocks[left_child(parent)];
            let right = self.blocks[right_child(parent)];
            if left.is_free && !left.split && right.is_free && !right.split {
                self.blocks[parent].split = false;
            }
        }

        Ok(())
    }

    /// Search the subtree rooted at `index` for a block of at least `size` bytes.
    fn find_block(&mut self, index: usize, size: usize) -> Option<usize> {
        let block = self.blocks[index];
        if block.size < size {
            return None;
        }

        if !block.split {
            if !block.is_free {
                return None;
            }

            let half = block.size / 2;
            if half < self.min_block_size || half < size {
                self.blocks[index].is_free = false;
                return Some(index);
            }
            self.split(index);
        }

        self.find_block(left_child(index), size)
            .or_else(|| self.find_block(right_child(index), size))
    }

    fn split(&mut self, index: usize) {
        self.blocks[index].split = true;
        for child in [left_child(index), right_child(index)] {
            let block = &mut self.blocks[child];
            block.is_free = true;
            block.split = false;
        }
    }

    /// Index of the leaf whose range contains `offset`.
    fn leaf_at(&self, offset: usize) -> usize {
        let mut index = 0;
        while self.blocks[index].split {
            let right = right_child(index);
            index = if offset < self.blocks[right].offset {
                left_child(index)
            } else {
                right
            };
        }
        index
    }

    /// Byte offset of `ptr` within the arena.
    #[must_use]
    pub fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        element_offset(self.memory.as_ptr(), self.memory.len(), ptr.as_ptr())
    }

    /// The allocated block starting at `ptr`.
    fn allocated_leaf(&self, ptr: NonNull<u8>) -> Option<Block> {
        let offset = self.offset_of(ptr)?;
        let block = self.blocks[self.leaf_at(offset)];
        (block.offset == offset && !block.is_free).then_some(block)
    }

    /// Bytes of the allocated block starting at `ptr`.
    #[must_use]
    pub fn get(&self, ptr: NonNull<u8>) -> Option<&[u8]> {
        let block = self.allocated_leaf(ptr)?;
        Some(&self.memory[block.offset..block.offset + block.size])
    }

    /// Bytes of the allocated block starting at `ptr`.
    #[must_use]
    pub fn get_mut(&mut self, ptr: NonNull<u8>) -> Option<&mut [u8]> {
        let block = self.allocated_leaf(ptr)?;
        Some(&mut self.memory[block.offset..block.offset + block.size])
    }

    /// The whole arena.
    #[must_use]
    #[inline]
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    #[must_use]
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.memory.len()
    }

    #[must_use]
    #[inline]
    pub const fn min_block_size(&self) -> usize {
        self.min_block_size
    }

    /// Size of the node array, live or not.
    #[must_use]
    #[inline]
    pub const fn node_count(&self) -> usize {
        self.blocks.len()
    }

    /// Node `index`, if it is currently part of the tree.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&Block> {
        let mut ancestor = index;
        while let Some(up) = parent(ancestor) {
            if !self.blocks.get(up)?.split {
                return None;
            }
            ancestor = up;
        }
        self.blocks.get(index)
    }

    /// Nodes of the tree in pre-order, with their index.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, Block)> + '_ {
        PreOrder {
            blocks: &self.blocks,
            stack: vec![0],
        }
    }

    /// Leaves of the tree in ascending offset order, with their index.
    pub fn leaves(&self) -> impl Iterator<Item = (usize, Block)> + '_ {
        self.blocks().filter(|(_, block)| !block.split)
    }

    /// Indices of the leaves currently handed out.
    pub fn allocated_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.leaves()
            .filter(|(_, block)| !block.is_free)
            .map(|(index, _)| index)
    }
}

impl Inspect for BuddyAllocator {
    fn capacity(&self) -> usize {
        self.memory.len()
    }

    fn free_regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.leaves()
            .filter(|(_, block)| block.is_free)
            .map(|(_, block)| block.region())
    }

    fn allocated_regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.leaves()
            .filter(|(_, block)| !block.is_free)
            .map(|(_, block)| block.region())
    }
}

/// Pre-order walk over the live nodes of the tree.
struct PreOrder<'a> {
    blocks: &'a [Block],
    stack: Vec<usize>,
}

impl Iterator for PreOrder<'_> {
    type Item = (usize, Block);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let block = self.blocks[index];
        if block.split {
            self.stack.push(right_child(index));
            self.stack.push(left_child(index));
        }
        Some((index, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::check_coverage;
    use alloc::vec::Vec;

    fn small() -> BuddyAllocator {
        BuddyAllocator::new(BuddyConfig::new(1024, 128)).unwrap()
    }

    fn leaves(buddy: &BuddyAllocator) -> Vec<(usize, usize, bool)> {
        buddy
            .leaves()
            .map(|(_, block)| (block.offset, block.size, block.is_free))
            .collect()
    }

    #[test]
    fn test_buddy_init() {
        let buddy = small();
        assert_eq!(buddy.capacity(), 1024);
        assert_eq!(buddy.min_block_size(), 128);
        assert_eq!(buddy.node_count(), 15);
        assert_eq!(leaves(&buddy), [(0, 1024, true)]);
        assert_eq!(buddy.block(1), None);
    }

    #[test]
    fn test_buddy_init_errors() {
        let new = |capacity, min| BuddyAllocator::new(BuddyConfig::new(capacity, min)).err();
        assert_eq!(new(0, 1), Some(HeapError::InvalidCapacity));
        assert_eq!(new(1000, 8), Some(HeapError::CapacityNotPowerOfTwo));
        assert_eq!(new(1024, 0), Some(HeapError::InvalidMinBlockSize));
        assert_eq!(new(1024, 100), Some(HeapError::InvalidMinBlockSize));
        assert_eq!(new(1024, 2048), Some(HeapError::InvalidMinBlockSize));
        assert_eq!(new(1024, 1024), None);
    }

    #[test]
    fn test_buddy_default_geometry() {
        let buddy = BuddyAllocator::new(BuddyConfig::default()).unwrap();
        assert_eq!(buddy.node_count(), 255);
    }

    #[test]
    fn test_buddy_two_small_allocations() {
        let mut buddy = small();
        let a = buddy.alloc(100).unwrap();
        let b = buddy.alloc(100).unwrap();

        assert_eq!(buddy.offset_of(a), Some(0));
        assert_eq!(buddy.offset_of(b), Some(128));
        assert_eq!(buddy.get(a).map(<[u8]>::len), Some(128));
        assert_eq!(buddy.allocated_indices().collect::<Vec<_>>(), [7, 8]);
        assert_eq!(
            leaves(&buddy),
            [
                (0, 128, false),
                (128, 128, false),
                (256, 256, true),
                (512, 512, true)
            ]
        );
    }

    #[test]
    fn test_buddy_alloc_errors() {
        let mut buddy = small();
        assert_eq!(buddy.alloc(0), Err(HeapError::InvalidSize));
        assert_eq!(buddy.alloc(1025), Err(HeapError::OutOfMemory));

        for _ in 0..8 {
            buddy.alloc(1).unwrap();
        }
        assert_eq!(buddy.alloc(1), Err(HeapError::OutOfMemory));
    }

    #[test]
    fn test_buddy_whole_arena() {
        let mut buddy = small();
        let a = buddy.alloc(1024).unwrap();
        assert_eq!(buddy.allocated_indices().collect::<Vec<_>>(), [0]);
        assert_eq!(buddy.alloc(1), Err(HeapError::OutOfMemory));

        // The root has no buddy to merge with
        buddy.free(a).unwrap();
        assert_eq!(leaves(&buddy), [(0, 1024, true)]);
        buddy.alloc(600).unwrap();
    }

    #[test]
    fn test_buddy_merge_is_single_level() {
        let mut buddy = small();
        let a = buddy.alloc(100).unwrap();
        let b = buddy.alloc(100).unwrap();

        buddy.free(a).unwrap();
        assert!(buddy.block(3).unwrap().split);

        buddy.free(b).unwrap();
        assert!(!buddy.block(3).unwrap().split);
        // Blocks 3 and 4 are both free, but block 1 stays split
        assert!(buddy.block(1).unwrap().split);
        assert_eq!(
            leaves(&buddy),
            [(0, 256, true), (256, 256, true), (512, 512, true)]
        );

        let c = buddy.alloc(512).unwrap();
        assert_eq!(buddy.offset_of(c), Some(512));
        assert_eq!(buddy.alloc(300), Err(HeapError::OutOfMemory));
        assert!(buddy.alloc(256).is_ok());
    }

    #[test]
    fn test_buddy_free_errors() {
        let mut buddy = small();
        let a = buddy.alloc(100).unwrap();

        let mut outside = 0u8;
        assert_eq!(buddy.free(NonNull::from(&mut outside)), Err(HeapError::InvalidPointer));

        let interior = a.map_addr(|addr| addr.saturating_add(64));
        assert_eq!(buddy.free(interior), Err(HeapError::InvalidPointer));
        assert_eq!(buddy.get(interior), None);

        let free_block = a.map_addr(|addr| addr.saturating_add(512));
        assert_eq!(buddy.free(free_block), Err(HeapError::DoubleFree));

        buddy.free(a).unwrap();
        let before: Vec<_> = buddy.blocks().collect();
        assert_eq!(buddy.free(a), Err(HeapError::DoubleFree));
        assert_eq!(buddy.blocks().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_buddy_get_mut() {
        let mut buddy = small();
        let a = buddy.alloc(200).unwrap();
        buddy.get_mut(a).unwrap().fill(0xAB);

        assert!(buddy.memory()[..256].iter().all(|&byte| byte == 0xAB));
        assert!(buddy.memory()[256..].iter().all(|&byte| byte == 0));

        buddy.free(a).unwrap();
        assert_eq!(buddy.get(a), None);
    }

    #[test]
    fn test_buddy_block_liveness() {
        let mut buddy = small();
        buddy.alloc(300).unwrap();

        assert!(buddy.block(0).is_some());
        assert!(buddy.block(1).is_some());
        assert!(buddy.block(3).is_none());
        assert!(buddy.block(15).is_none());

        let order: Vec<usize> = buddy.blocks().map(|(index, _)| index).collect();
        assert_eq!(order, [0, 1, 2]);
    }

    #[test]
    fn test_buddy_coverage() {
        let mut buddy = BuddyAllocator::new(BuddyConfig::with_granularity(4096, 32)).unwrap();
        let mut live = Vec::new();
        for size in [100, 1000, 128, 7, 600, 2000] {
            if let Ok(ptr) = buddy.alloc(size) {
                live.push(ptr);
            }
            assert_eq!(check_coverage(&buddy), Ok(()));
        }
        for ptr in live {
            buddy.free(ptr).unwrap();
            assert_eq!(check_coverage(&buddy), Ok(()));
        }
    }
}
