use thiserror::Error;

use crate::align::{align_up, is_aligned_ptr};

/// Failure to obtain native memory for a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("allocation of {bytes} bytes exceeds the addressable size")]
    CapacityOverflow { bytes: usize },

    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(usize),
}

impl AllocError {
    /// Number of bytes the failed request asked for (zero for alignment errors).
    pub fn requested_bytes(&self) -> usize {
        match self {
            AllocError::OutOfMemory { bytes } | AllocError::CapacityOverflow { bytes } => *bytes,
            AllocError::InvalidAlignment(_) => 0,
        }
    }
}

/// A fixed-size, zero-initialized, aligned region of native memory.
///
/// Unlike a growable vector, a `NativeBlock` never reallocates: the address
/// returned by [`NativeBlock::as_mut_ptr`] is stable for the whole lifetime of
/// the block, including when the block value itself is moved. This is what lets
/// owner handles give out interior addresses to views.
///
/// The memory is released when the block is dropped.
pub struct NativeBlock {
    /// Backing storage, may include padding at the start.
    inner: Vec<u8>,
    /// Offset from the start of `inner` to the aligned data.
    start: usize,
    /// Length of the usable region in bytes.
    len: usize,
    /// Alignment requested at creation.
    alignment: usize,
}

impl NativeBlock {
    /// Alignment used by the core when the element type asks for less.
    pub const PREFERRED_ALIGNMENT: usize = 64;

    /// Allocates a zero-filled block of `len` bytes aligned to `alignment`.
    ///
    /// The allocation is fallible: exhausting memory is reported as
    /// [`AllocError::OutOfMemory`] instead of aborting the process.
    pub fn try_zeroed(len: usize, alignment: usize) -> Result<NativeBlock, AllocError> {
        let alignment = alignment.max(1);
        if !alignment.is_power_of_two() {
            return Err(AllocError::InvalidAlignment(alignment));
        }

        let capacity = len
            .checked_add(alignment)
            .filter(|&c| c <= isize::MAX as usize)
            .ok_or(AllocError::CapacityOverflow { bytes: len })?;

        let mut inner = Vec::<u8>::new();
        inner
            .try_reserve_exact(capacity)
            .map_err(|_| AllocError::OutOfMemory { bytes: capacity })?;
        inner.resize(capacity, 0);

        let p = inner.as_ptr() as usize;
        let aligned = align_up(p, alignment).ok_or(AllocError::CapacityOverflow { bytes: len })?;
        let start = aligned - p;
        debug_assert!(start + len <= inner.len());

        Ok(NativeBlock {
            inner,
            start,
            len,
            alignment,
        })
    }

    /// Allocates a block holding a copy of `data`.
    pub fn try_copy_from_slice(data: &[u8], alignment: usize) -> Result<NativeBlock, AllocError> {
        let mut block = Self::try_zeroed(data.len(), alignment)?;
        block.as_mut_slice().copy_from_slice(data);
        Ok(block)
    }

    /// Returns the number of usable bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the block has no usable bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the alignment the block was created with.
    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Returns the total allocated size in bytes, including alignment padding.
    pub fn heap_size(&self) -> usize {
        self.inner.capacity()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        unsafe { self.inner.as_ptr().add(self.start) }
    }

    /// Returns a mutable raw pointer to the start of the usable region.
    ///
    /// The pointer stays valid until the block is dropped.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        unsafe { self.inner.as_mut_ptr().add(self.start) }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }

    /// Checks if the usable region starts at the given alignment.
    pub fn is_aligned(&self, alignment: usize) -> bool {
        is_aligned_ptr(self.as_ptr(), alignment)
    }

    /// Interprets the block as a slice of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the block length is not a multiple of `size_of::<T>()` or the
    /// block alignment is insufficient for `T`.
    #[inline]
    pub fn typed_data<T>(&self) -> &[T]
    where
        T: bytemuck::AnyBitPattern,
    {
        bytemuck::cast_slice(self.as_slice())
    }

    /// Interprets the block as a mutable slice of `T`.
    #[inline]
    pub fn typed_data_mut<T>(&mut self) -> &mut [T]
    where
        T: bytemuck::AnyBitPattern + bytemuck::NoUninit,
    {
        bytemuck::cast_slice_mut(self.as_mut_slice())
    }
}

impl std::fmt::Debug for NativeBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBlock")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len)
            .field("alignment", &self.alignment)
            .field("internal_offset", &self.start)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_block() {
        let block = NativeBlock::try_zeroed(100, 64).unwrap();
        assert_eq!(block.len(), 100);
        assert!(!block.is_empty());
        assert!(block.is_aligned(64));
        assert!(block.as_slice().iter().all(|&b| b == 0));
        assert!(block.heap_size() >= 164);
    }

    #[test]
    fn test_empty_block_has_aligned_address() {
        let block = NativeBlock::try_zeroed(0, 128).unwrap();
        assert!(block.is_empty());
        assert!(!block.as_ptr().is_null());
        assert!(block.is_aligned(128));
    }

    #[test]
    fn test_address_is_stable_across_moves() {
        let mut block = NativeBlock::try_copy_from_slice(&[1, 2, 3, 4], 16).unwrap();
        let p = block.as_mut_ptr();
        let moved = vec![block];
        assert_eq!(moved[0].as_ptr(), p as *const u8);
        assert_eq!(moved[0].as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_typed_access() {
        let mut block = NativeBlock::try_zeroed(4 * std::mem::size_of::<u32>(), 64).unwrap();
        block.typed_data_mut::<u32>().copy_from_slice(&[7, 8, 9, 10]);
        assert_eq!(block.typed_data::<u32>(), &[7, 8, 9, 10]);
    }

    #[test]
    fn test_invalid_alignment() {
        assert_eq!(
            NativeBlock::try_zeroed(8, 24).unwrap_err(),
            AllocError::InvalidAlignment(24)
        );
    }

    #[test]
    fn test_capacity_overflow() {
        let err = NativeBlock::try_zeroed(usize::MAX - 4, 64).unwrap_err();
        assert!(matches!(err, AllocError::CapacityOverflow { .. }));
        assert_eq!(err.requested_bytes(), usize::MAX - 4);
    }
}
