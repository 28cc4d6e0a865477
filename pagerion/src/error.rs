use thiserror::Error;

/// Errors that can occur during allocator operations
///
/// Every variant maps to a stable negative status code (see [`HeapError::code`])
/// so that callers which cannot deal with rich error types can still tell
/// failures apart.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapError {
    /// The allocator has already been initialized
    #[error("Allocator already initialized")]
    AlreadyInitialized,
    /// Capacity must be non-zero
    #[error("Invalid capacity (must be non-zero)")]
    InvalidCapacity,
    /// Capacity must be a power of two
    #[error("Capacity must be a power of two")]
    CapacityNotPowerOfTwo,
    /// Minimum block size must be a non-zero power of two, no larger than the capacity
    #[error("Invalid minimum block size")]
    InvalidMinBlockSize,
    /// The allocator has not been initialized yet
    #[error("Allocator not initialized")]
    NotInitialized,
    /// Attempted to free a pointer that was not allocated
    #[error("Invalid pointer")]
    InvalidPointer,
    /// Double free detected
    #[error("Double free detected")]
    DoubleFree,
    /// Invalid size (must be non-zero and no larger than the capacity)
    #[error("Invalid size")]
    InvalidSize,
    /// Out of memory
    #[error("Out of memory")]
    OutOfMemory,
    /// No unused free-region link slot was left
    #[error("Free-region link storage exhausted")]
    LinkStorageExhausted,
}

impl HeapError {
    /// Negative status code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::AlreadyInitialized => -1,
            Self::InvalidCapacity => -2,
            Self::CapacityNotPowerOfTwo => -3,
            Self::InvalidMinBlockSize => -4,
            Self::NotInitialized => -5,
            Self::InvalidPointer => -6,
            Self::DoubleFree => -7,
            Self::InvalidSize => -8,
            Self::OutOfMemory => -9,
            Self::LinkStorageExhausted => -10,
        }
    }

    /// Inverse of [`HeapError::code`].
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::AlreadyInitialized,
            -2 => Self::InvalidCapacity,
            -3 => Self::CapacityNotPowerOfTwo,
            -4 => Self::InvalidMinBlockSize,
            -5 => Self::NotInitialized,
            -6 => Self::InvalidPointer,
            -7 => Self::DoubleFree,
            -8 => Self::InvalidSize,
            -9 => Self::OutOfMemory,
            -10 => Self::LinkStorageExhausted,
            _ => return None,
        })
    }
}

impl From<HeapError> for i32 {
    fn from(error: HeapError) -> Self {
        error.code()
    }
}

pub type Result<T> = core::result::Result<T, HeapError>;

/// Collapse a unit result into a status code: `0` on success, negative otherwise.
#[must_use]
#[inline]
pub const fn status_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(error) => error.code(),
    }
}
