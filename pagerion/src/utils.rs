/// Index of the element `ptr` points to in the `len`-element array starting at `base`.
///
/// Returns `None` if `ptr` lies outside the array or not on an element boundary.
#[inline]
pub fn element_offset<T>(base: *const T, len: usize, ptr: *const T) -> Option<usize> {
    let size = size_of::<T>();
    let delta = ptr.addr().checked_sub(base.addr())?;
    if size == 0 || delta % size != 0 {
        return None;
    }
    let offset = delta / size;
    (offset < len).then_some(offset)
}

/// Calculate the number of split levels between `size` and `min_size`.
///
/// Both values must be powers of two with `min_size <= size`.
#[inline]
pub const fn split_levels(size: usize, min_size: usize) -> usize {
    debug_assert!(size.is_power_of_two() && min_size.is_power_of_two());
    debug_assert!(min_size <= size);
    (size / min_size).ilog2() as usize
}

/// Number of nodes in a complete binary tree with `levels` levels below the root.
#[inline]
pub const fn tree_node_count(levels: usize) -> usize {
    (1 << (levels + 1)) - 1
}

#[inline]
pub const fn left_child(index: usize) -> usize {
    2 * index + 1
}

#[inline]
pub const fn right_child(index: usize) -> usize {
    2 * index + 2
}

#[inline]
pub const fn parent(index: usize) -> Option<usize> {
    if index == 0 {
        None
    } else {
        Some((index - 1) / 2)
    }
}
