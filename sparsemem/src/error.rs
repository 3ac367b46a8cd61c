//! Crate-wide error type.

use thiserror::Error;

/// Errors reported by the container.
///
/// Every fallible public operation reports one of these. No operation
/// swallows an error, and an error never leaves the container in a state
/// that fails [crate::Memory::validate].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MemError {
    /// Checked arithmetic on an address or size exceeded its bounds.
    #[error("address or size arithmetic overflowed")]
    Overflow,

    /// A buffer allocation was refused by the allocator.
    #[error("buffer allocation failed")]
    OutOfMemory,

    /// A positional offset lies outside the live payload, or a mutation was
    /// given a reversed address range.
    #[error("offset out of range")]
    IndexOutOfRange,

    /// An operation that repeats a pattern was given an empty one.
    #[error("a non-empty pattern is required")]
    InvalidPattern,

    /// A contiguous view was requested over data that has gaps, or whose
    /// bounds do not line up with a single block.
    #[error("memory is not contiguous")]
    NonContiguous,

    /// A block cannot be mutated while a view over it is outstanding.
    #[error("block is frozen by an exported view")]
    BlockLocked,

    /// The item searched for by `index`/`rindex`/`remove` is absent.
    #[error("subsequence not found")]
    NotFound,

    /// A block sequence is unsorted, overlapping or contains empty blocks.
    #[error("blocks must be non-empty, sorted and non-overlapping")]
    InvalidBlocks,
}

/// Shorthand for results carrying a [MemError].
pub type Result<T> = std::result::Result<T, MemError>;
