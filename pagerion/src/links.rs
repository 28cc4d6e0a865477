//! Free-region list backed by a preallocated link arena
//!
//! The list nodes live in a fixed slot array instead of being heap allocated one
//! by one, so the pools never call back into a general-purpose allocator while
//! managing their own free space. A slot whose length is zero is unused; finding
//! one is a linear scan over the slots.
//!
//! Free regions are kept in ascending offset order and are never adjacent: a
//! released range is merged into its neighbours before anything else happens.
//! That bounds the number of live regions to `ceil(capacity / 2)`, which is why
//! [`FreeList::slots_for`] reserves `capacity / 2 + 1` slots.
use alloc::vec::Vec;

use crate::{
    error::{HeapError, Result},
    inspect::Region,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One slot of the link arena.
pub struct FreeLink {
    pub offset: usize,
    pub len: usize,
    /// Index of the next link in offset order.
    pub next: Option<usize>,
}

impl FreeLink {
    const UNUSED: Self = Self {
        offset: 0,
        len: 0,
        next: None,
    };

    #[must_use]
    #[inline]
    pub const fn is_unused(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    #[inline]
    pub const fn region(&self) -> Region {
        Region::new(self.offset, self.len)
    }
}

#[derive(Debug, Default)]
/// Address-ordered list of free regions.
pub struct FreeList {
    links: Vec<FreeLink>,
    head: Option<usize>,
}

impl FreeList {
    /// An empty list with no link storage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            links: Vec::new(),
            head: None,
        }
    }

    /// Number of link slots needed to track every free region of a `capacity`-sized store.
    #[must_use]
    #[inline]
    pub const fn slots_for(capacity: usize) -> usize {
        capacity / 2 + 1
    }

    /// A list holding a single free region spanning `[0, capacity)`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity > 0);

        let mut links = alloc::vec![FreeLink::UNUSED; Self::slots_for(capacity)];
        links[0] = FreeLink {
            offset: 0,
            len: capacity,
            next: None,
        };

        Self {
            links,
            head: Some(0),
        }
    }

    /// Drop every region and release the link storage.
    pub fn clear(&mut self) {
        self.links = Vec::new();
        self.head = None;
    }

    /// Index of the first link, if any region is free.
    #[must_use]
    #[inline]
    pub const fn head(&self) -> Option<usize> {
        self.head
    }

    /// The raw link arena, including unused slots.
    #[must_use]
    #[inline]
    pub fn links(&self) -> &[FreeLink] {
        &self.links
    }

    /// Iterate over free regions in ascending offset order.
    #[must_use]
    pub fn iter(&self) -> Regions<'_> {
        Regions {
            links: &self.links,
            current: self.head,
        }
    }

    /// Total number of free units.
    #[must_use]
    pub fn free_total(&self) -> usize {
        self.iter().map(|region| region.len).sum()
    }

    /// Whether `offset` lies inside a free region.
    #[must_use]
    pub fn contains(&self, offset: usize) -> bool {
        self.iter()
            .take_while(|region| region.offset <= offset)
            .any(|region| region.contains(offset))
    }

    /// Carve `count` units from the front of the first region large enough.
    ///
    /// Returns the offset of the carved range. The region is unlinked and its
    /// slot marked unused if it is fully consumed.
    pub fn take_first_fit(&mut self, count: usize) -> Option<usize> {
        debug_assert!(count > 0);

        let mut prev: Option<usize> = None;
        let mut current = self.head;

        while let Some(index) = current {
            let link = &mut self.links[index];

            if link.len >= count {
                let offset = link.offset;
                link.offset += count;
                link.len -= count;

                if link.len == 0 {
                    let next = link.next;
                    *link = FreeLink::UNUSED;
                    match prev {
                        Some(prev) => self.links[prev].next = next,
                        None => self.head = next,
                    }
                }

                return Some(offset);
            }

            prev = current;
            current = link.next;
        }

        None
    }

    /// Return `[offset, offset + count)` to the list, merging with its neighbours.
    ///
    /// # Errors
    ///
    /// - `HeapError::DoubleFree` if the range overlaps a region that is already free
    /// - `HeapError::LinkStorageExhausted` if a new link is needed and no slot is unused
    ///
    /// The list is left untouched on error.
    pub fn release(&mut self, offset: usize, count: usize) -> Result<()> {
        debug_assert!(count > 0);
        let end = offset + count;

        // Find `left` and `right` such that left.offset <= offset < right.offset
        let mut left = None;
        let mut right = self.head;
        while let Some(index) = right {
            if offset < self.links[index].offset {
                break;
            }
            left = right;
            right = self.links[index].next;
        }

        let left_end = left.map(|index| self.links[index].region().end());
        let right_start = right.map(|index| self.links[index].offset);

        if left_end.is_some_and(|left_end| left_end > offset)
            || right_start.is_some_and(|right_start| right_start < end)
        {
            return Err(HeapError::DoubleFree);
        }

        let touches_left = left_end == Some(offset);
        let touches_right = right_start == Some(end);

        match (left, right) {
            (Some(left), Some(right)) if touches_left && touches_right => {
                let absorbed = self.links[right];
                let link = &mut self.links[left];
                link.len += count + absorbed.len;
                link.next = absorbed.next;
                self.links[right] = FreeLink::UNUSED;
            }
            (Some(left), _) if touches_left => {
                self.links[left].len += count;
            }
            (_, Some(right)) if touches_right => {
                let link = &mut self.links[right];
                link.offset = offset;
                link.len += count;
            }
            _ => {
                let slot = self
                    .unused_slot()
                    .ok_or(HeapError::LinkStorageExhausted)?;
                self.links[slot] = FreeLink {
                    offset,
                    len: count,
                    next: right,
                };
                match left {
                    Some(left) => self.links[left].next = Some(slot),
                    None => self.head = Some(slot),
                }
            }
        }

        Ok(())
    }

    /// First slot of the arena that is not part of the list.
    fn unused_slot(&self) -> Option<usize> {
        self.links.iter().position(FreeLink::is_unused)
    }
}

/// Iterator over the free regions of a [`FreeList`].
pub struct Regions<'a> {
    links: &'a [FreeLink],
    current: Option<usize>,
}

impl Iterator for Regions<'_> {
    type Item = Region;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.links[self.current?];
        self.current = link.next;
        Some(link.region())
    }
}
