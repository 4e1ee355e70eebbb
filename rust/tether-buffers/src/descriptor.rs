//! The Buffer Descriptor: base address, element count and ownership tag of the
//! memory behind one handle.

use std::ptr::NonNull;

use tether_bytes::NativeBlock;
use tether_common::{Result, error::Error};

use crate::registry::RegistryKey;

/// Largest element count a descriptor can carry. Anything above would make the
/// signed count encoding overflow on negation.
pub const MAX_ELEMENT_COUNT: usize = isize::MAX as usize;

/// The ownership tag of a handle. Exactly one holds for a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// The handle allocated its memory and frees it exactly once.
    Owner,
    /// The handle aliases memory owned by another handle.
    View,
    /// The handle references memory the core does not manage.
    External,
}

/// What the handle holds in addition to the base address.
#[derive(Debug)]
pub enum Ownership {
    /// The owned allocation. Dropping it frees the memory.
    Owner(NativeBlock),
    /// The registry key that keeps the root owner reachable.
    View(RegistryKey),
    External,
}

#[derive(Debug)]
pub struct BufferDescriptor {
    base: NonNull<u8>,
    len: usize,
    ownership: Ownership,
}

impl BufferDescriptor {
    /// Wraps an allocation holding `count` elements.
    pub(crate) fn make_owner(mut block: NativeBlock, count: usize) -> Result<BufferDescriptor> {
        check_count(count)?;
        let base = NonNull::new(block.as_mut_ptr())
            .ok_or_else(|| Error::type_error("base", "owner base address is null"))?;
        Ok(BufferDescriptor {
            base,
            len: count,
            ownership: Ownership::Owner(block),
        })
    }

    /// Describes `count` elements at `base`, owned by whatever `key` holds.
    pub(crate) fn make_view(base: *mut u8, count: usize, key: RegistryKey) -> Result<BufferDescriptor> {
        check_count(count)?;
        let base = NonNull::new(base)
            .ok_or_else(|| Error::type_error("base", "view base address is null"))?;
        Ok(BufferDescriptor {
            base,
            len: count,
            ownership: Ownership::View(key),
        })
    }

    /// Describes a foreign address with no known extent.
    pub fn make_external(base: *mut u8) -> Result<BufferDescriptor> {
        let base = NonNull::new(base)
            .ok_or_else(|| Error::type_error("base", "external base address is null"))?;
        Ok(BufferDescriptor {
            base,
            len: 0,
            ownership: Ownership::External,
        })
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        match self.ownership {
            Ownership::Owner(_) => Tag::Owner,
            Ownership::View(_) => Tag::View,
            Ownership::External => Tag::External,
        }
    }

    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Number of elements, `|count|`. Always zero for external pointers.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The signed count encoding seen by native glue: positive for owners,
    /// negative for views, zero for external pointers.
    ///
    /// Empty owners and views also encode as zero, so the tag must be taken
    /// from [`BufferDescriptor::tag`].
    pub fn count(&self) -> isize {
        // `len` never exceeds MAX_ELEMENT_COUNT.
        let len = self.len as isize;
        match self.ownership {
            Ownership::Owner(_) => len,
            Ownership::View(_) => -len,
            Ownership::External => 0,
        }
    }

    /// The registry key of a view.
    #[inline]
    pub fn liveness_ref(&self) -> Option<RegistryKey> {
        match self.ownership {
            Ownership::View(key) => Some(key),
            _ => None,
        }
    }

    #[inline]
    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub(crate) fn into_ownership(self) -> Ownership {
        self.ownership
    }

    /// Size of the described range in bytes for elements of `elem_size` bytes.
    #[inline]
    pub fn byte_len(&self, elem_size: usize) -> usize {
        self.len * elem_size
    }
}

fn check_count(count: usize) -> Result<()> {
    if count > MAX_ELEMENT_COUNT {
        return Err(Error::range(
            "count",
            format!("{count} exceeds the maximum element count"),
        ));
    }
    Ok(())
}
