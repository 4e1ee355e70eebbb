//! Operations over owner and view handles.
//!
//! All of them refuse external pointers with a `TypeError`. They validate
//! every argument before touching memory, so a failed call leaves its
//! operands as they were. Operations that allocate a new owner run pending
//! automatic collection only after their operands are no longer read.

mod access;
mod compare;
mod reorder;
mod transfer;

pub use reorder::Direction;

/// Converts a 1-based host index into a slice position.
#[inline]
pub(crate) fn position(index: isize, len: usize) -> Option<usize> {
    if index < 1 {
        return None;
    }
    let i = (index - 1) as usize;
    (i < len).then_some(i)
}
