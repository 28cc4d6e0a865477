//! Read-only introspection of allocator state
//!
//! Visualizers and tests only ever look at an allocator through these views.
//! Views borrow the allocator, so they cannot outlive the next `alloc`, `free`
//! or `reset`.
//!
//! Units depend on the allocator: elements for the pools, bytes for the buddy
//! and stack allocators.
use alloc::vec::Vec;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A contiguous range `[offset, offset + len)` of a backing store.
pub struct Region {
    pub offset: usize,
    pub len: usize,
}

impl Region {
    #[must_use]
    #[inline]
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    #[must_use]
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    #[must_use]
    #[inline]
    pub const fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

/// Common debug view over an allocator's free and allocated space.
pub trait Inspect {
    /// Size of the backing store.
    fn capacity(&self) -> usize;

    /// Free regions, in ascending offset order.
    fn free_regions(&self) -> impl Iterator<Item = Region> + '_;

    /// Live allocations, in no particular order.
    fn allocated_regions(&self) -> impl Iterator<Item = Region> + '_;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LayoutViolation {
    #[error("Region at {offset} (length {len}) exceeds capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    #[error("Regions overlap at offset {offset}")]
    Overlap { offset: usize },
    #[error("Unaccounted gap at offset {offset} (length {len})")]
    Gap { offset: usize, len: usize },
    #[error("Free regions at {first} and {second} are adjacent")]
    AdjacentFree { first: usize, second: usize },
}

/// Check that free and allocated regions exactly partition `[0, capacity)`.
///
/// # Errors
///
/// Returns the first violation found, scanning in offset order.
pub fn check_coverage<I: Inspect>(inspect: &I) -> Result<(), LayoutViolation> {
    let capacity = inspect.capacity();

    let mut regions: Vec<Region> = inspect
        .free_regions()
        .chain(inspect.allocated_regions())
        .collect();
    regions.sort_unstable();

    let mut cursor = 0;
    for region in regions {
        if region.end() > capacity {
            return Err(LayoutViolation::OutOfBounds {
                offset: region.offset,
                len: region.len,
                capacity,
            });
        }
        if region.offset < cursor {
            return Err(LayoutViolation::Overlap {
                offset: region.offset,
            });
        }
        if region.offset > cursor {
            return Err(LayoutViolation::Gap {
                offset: cursor,
                len: region.offset - cursor,
            });
        }
        cursor = region.end();
    }

    if cursor < capacity {
        return Err(LayoutViolation::Gap {
            offset: cursor,
            len: capacity - cursor,
        });
    }

    Ok(())
}

/// Check that no two free regions touch.
///
/// This holds for the pools after every free. The buddy allocator only merges
/// siblings one level at a time, so adjacent free leaves are expected there.
///
/// # Errors
///
/// Returns the first pair of adjacent free regions.
pub fn check_coalesced<I: Inspect>(inspect: &I) -> Result<(), LayoutViolation> {
    let mut free: Vec<Region> = inspect.free_regions().collect();
    free.sort_unstable();

    for pair in free.windows(2) {
        if pair[0].end() == pair[1].offset {
            return Err(LayoutViolation::AdjacentFree {
                first: pair[0].offset,
                second: pair[1].offset,
            });
        }
    }

    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Summary of an allocator's occupancy.
pub struct Usage {
    pub capacity: usize,
    pub free: usize,
    pub allocated: usize,
    pub free_regions: usize,
    pub allocations: usize,
    pub largest_free: usize,
}

#[must_use]
pub fn usage<I: Inspect>(inspect: &I) -> Usage {
    let mut usage = Usage {
        capacity: inspect.capacity(),
        ..Usage::default()
    };

    for region in inspect.free_regions() {
        usage.free += region.len;
        usage.free_regions += 1;
        usage.largest_free = usage.largest_free.max(region.len);
    }
    for region in inspect.allocated_regions() {
        usage.allocated += region.len;
        usage.allocations += 1;
    }

    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    struct Fixed {
        capacity: usize,
        free: Vec<Region>,
        allocated: Vec<Region>,
    }

    impl Inspect for Fixed {
        fn capacity(&self) -> usize {
            self.capacity
        }

        fn free_regions(&self) -> impl Iterator<Item = Region> + '_ {
            self.free.iter().copied()
        }

        fn allocated_regions(&self) -> impl Iterator<Item = Region> + '_ {
            self.allocated.iter().copied()
        }
    }

    #[test]
    fn test_coverage_ok() {
        let layout = Fixed {
            capacity: 16,
            free: vec![Region::new(5, 3), Region::new(12, 4)],
            allocated: vec![Region::new(8, 4), Region::new(0, 5)],
        };
        assert_eq!(check_coverage(&layout), Ok(()));
        assert_eq!(check_coalesced(&layout), Ok(()));
    }

    #[test]
    fn test_coverage_gap() {
        let layout = Fixed {
            capacity: 16,
            free: vec![Region::new(10, 6)],
            allocated: vec![Region::new(0, 5)],
        };
        assert_eq!(
            check_coverage(&layout),
            Err(LayoutViolation::Gap { offset: 5, len: 5 })
        );
    }

    #[test]
    fn test_coverage_overlap_and_bounds() {
        let layout = Fixed {
            capacity: 16,
            free: vec![Region::new(4, 12)],
            allocated: vec![Region::new(0, 5)],
        };
        assert_eq!(
            check_coverage(&layout),
            Err(LayoutViolation::Overlap { offset: 4 })
        );

        let layout = Fixed {
            capacity: 16,
            free: vec![Region::new(8, 10)],
            allocated: vec![Region::new(0, 8)],
        };
        assert!(matches!(
            check_coverage(&layout),
            Err(LayoutViolation::OutOfBounds { offset: 8, .. })
        ));
    }

    #[test]
    fn test_adjacent_free() {
        let layout = Fixed {
            capacity: 8,
            free: vec![Region::new(0, 4), Region::new(4, 4)],
            allocated: vec![],
        };
        assert_eq!(check_coverage(&layout), Ok(()));
        assert_eq!(
            check_coalesced(&layout),
            Err(LayoutViolation::AdjacentFree {
                first: 0,
                second: 4
            })
        );
    }

    #[test]
    fn test_usage() {
        let layout = Fixed {
            capacity: 16,
            free: vec![Region::new(5, 3), Region::new(12, 4)],
            allocated: vec![Region::new(0, 5), Region::new(8, 4)],
        };
        let usage = usage(&layout);
        assert_eq!(usage.free, 7);
        assert_eq!(usage.allocated, 9);
        assert_eq!(usage.free_regions, 2);
        assert_eq!(usage.allocations, 2);
        assert_eq!(usage.largest_free, 4);
    }
}
