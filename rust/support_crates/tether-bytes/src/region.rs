//! Address ranges and overlap-safe byte movement.

/// A half-open range of addresses `[start, end)`.
///
/// Only the numeric addresses are kept; an `AddressRange` never grants access
/// to the memory it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    start: usize,
    end: usize,
}

impl AddressRange {
    /// Describes `len` bytes starting at `ptr`. The end saturates at the top of
    /// the address space.
    pub fn new(ptr: *const u8, len: usize) -> AddressRange {
        let start = ptr as usize;
        AddressRange {
            start,
            end: start.saturating_add(len),
        }
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` if `other` lies entirely within `self`.
    ///
    /// An empty `other` is contained when its position falls within
    /// `[self.start, self.end]`.
    pub fn contains(&self, other: &AddressRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns `true` if the two ranges share at least one byte.
    pub fn overlaps(&self, other: &AddressRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Copies `len` bytes from `src` to `dst`, correct for overlapping regions.
///
/// # Safety
///
/// `src` must be valid for reads and `dst` valid for writes of `len` bytes.
#[inline]
pub unsafe fn move_bytes(src: *const u8, dst: *mut u8, len: usize) {
    if len != 0 && src != dst as *const u8 {
        unsafe { std::ptr::copy(src, dst, len) };
    }
}
