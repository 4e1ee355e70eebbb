//! The View Constructor and the partitions built on top of it.
//!
//! A view aliases a sub-range of an owner's memory and never frees it. Views
//! are flattened: the registry key of every view names the root owner, so a
//! view of a view shares the key of its source instead of pinning the
//! intermediate view.

use tether_common::{Result, error::Error, verify_range};

use crate::descriptor::{BufferDescriptor, Tag};
use crate::element::Element;
use crate::heap::{Handle, Heap};

impl Heap {
    /// Creates a view of `length` elements of `source` starting at the
    /// zero-based `offset`.
    ///
    /// Fails with a `TypeError` when `source` is an external pointer and with a
    /// `RangeError` when the range does not fit inside `source`. Exactly one
    /// registry increment happens on success and none on failure.
    pub fn make_view_of<T: Element>(
        &mut self,
        source: Handle<T>,
        offset: isize,
        length: isize,
    ) -> Result<Handle<T>> {
        self.view_source(source, "make_view_of")?;
        verify_range!(offset, offset >= 0);
        verify_range!(length, length >= 0);
        self.view_range(source, offset as usize, length as usize)
    }

    /// The view of `[n, len)`: the handle's base pointer advanced by `n`
    /// elements.
    pub fn advance<T: Element>(&mut self, handle: Handle<T>, n: isize) -> Result<Handle<T>> {
        let len = self.view_source(handle, "advance")?;
        verify_range!(n, n >= 0);
        let n = n as usize;
        if n > len {
            return Err(Error::range(
                "n",
                format!("cannot advance {n} elements past a buffer of {len}"),
            ));
        }
        self.view_range(handle, n, len - n)
    }

    /// Splits `handle` into `parts` contiguous views of equal length.
    pub fn partition_into<T: Element>(
        &mut self,
        handle: Handle<T>,
        parts: isize,
    ) -> Result<Vec<Handle<T>>> {
        let len = self.partition_source(handle, "partition_into")?;
        verify_range!(parts, parts > 0);
        let parts = parts as usize;
        if len % parts != 0 {
            return Err(Error::range(
                "parts",
                format!("{len} elements do not divide into {parts} equal parts"),
            ));
        }
        let size = len / parts;
        self.strided_views(handle, parts, size, size)
    }

    /// Splits `handle` into contiguous views of `size` elements each.
    pub fn partition_by<T: Element>(
        &mut self,
        handle: Handle<T>,
        size: isize,
    ) -> Result<Vec<Handle<T>>> {
        let len = self.partition_source(handle, "partition_by")?;
        verify_range!(size, size > 0);
        let size = size as usize;
        if len % size != 0 {
            return Err(Error::range(
                "size",
                format!("{len} elements do not divide into parts of {size}"),
            ));
        }
        self.strided_views(handle, len / size, size, size)
    }

    /// Sliding windows of `width` elements, one element apart. Yields
    /// `len - width` views.
    pub fn windows<T: Element>(
        &mut self,
        handle: Handle<T>,
        width: isize,
    ) -> Result<Vec<Handle<T>>> {
        let len = self.partition_source(handle, "windows")?;
        verify_range!(width, width > 0);
        let width = width as usize;
        if width >= len {
            return Err(Error::range(
                "width",
                format!("window of {width} does not fit {len} elements"),
            ));
        }
        self.strided_views(handle, len - width, width, 1)
    }
}

impl Heap {
    /// Length of a sliceable handle; `TypeError` for external pointers.
    fn view_source<T: Element>(&self, source: Handle<T>, op: &str) -> Result<usize> {
        let descriptor = self.descriptor(source)?;
        if descriptor.tag() == Tag::External {
            return Err(Error::type_error(op, "cannot slice an external pointer"));
        }
        Ok(descriptor.len())
    }

    fn partition_source<T: Element>(&self, source: Handle<T>, op: &str) -> Result<usize> {
        let len = self.view_source(source, op)?;
        if len == 0 {
            return Err(Error::range(op, "cannot partition an empty buffer"));
        }
        Ok(len)
    }

    fn view_range<T: Element>(
        &mut self,
        source: Handle<T>,
        offset: usize,
        length: usize,
    ) -> Result<Handle<T>> {
        let cell = self.typed_cell(source)?;
        let available = cell.descriptor.len();
        let end = offset.checked_add(length).filter(|&end| end <= available);
        if end.is_none() {
            return Err(Error::range(
                "length",
                format!("view of {length} at offset {offset} exceeds {available} elements"),
            ));
        }

        // SAFETY: `offset <= available`, so the result stays inside (or one
        // past the end of) the source allocation.
        let base = unsafe {
            cell.descriptor
                .base()
                .as_ptr()
                .add(offset * std::mem::size_of::<T>())
        };
        let liveness = cell.descriptor.liveness_ref();
        let type_index = cell.type_index;

        let registry = self.registry_mut(type_index);
        let key = match liveness {
            Some(key) => {
                registry.retain(key)?;
                key
            }
            None => registry.register(source.id())?,
        };

        match BufferDescriptor::make_view(base, length, key).and_then(|d| self.insert(d)) {
            Ok(view) => Ok(view),
            Err(e) => {
                self.registry_mut(type_index).release(key)?;
                Err(e)
            }
        }
    }

    /// `count` views of `length` elements at offsets `0, stride, 2 * stride, ..`.
    ///
    /// Bounds were validated by the caller. If a view cannot be created, the
    /// ones already built are finalized before the error is returned, so the
    /// registry holds no use on their behalf.
    fn strided_views<T: Element>(
        &mut self,
        source: Handle<T>,
        count: usize,
        length: usize,
        stride: usize,
    ) -> Result<Vec<Handle<T>>> {
        let mut views = Vec::with_capacity(count);
        for i in 0..count {
            match self.view_range(source, i * stride, length) {
                Ok(view) => views.push(view),
                Err(e) => {
                    self.discard_views(&views);
                    return Err(e);
                }
            }
        }
        self.maybe_collect();
        Ok(views)
    }

    fn discard_views<T: Element>(&mut self, views: &[Handle<T>]) {
        for view in views.iter().rev() {
            if let Err(e) = self.discard(view.id()) {
                log::error!("rollback of view {view:?} failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptor::Tag;
    use crate::heap::Heap;

    fn heap() -> Heap {
        Heap::builder()
            .with_standard_types()
            .without_auto_collect()
            .build()
            .unwrap()
    }

    #[test]
    fn test_view_aliases_source() {
        let mut heap = heap();
        let owner = heap.from_slice(&[10u16, 11, 12, 13, 14]).unwrap();
        let view = heap.make_view_of(owner, 1, 3).unwrap();
        assert_eq!(heap.tag(view).unwrap(), Tag::View);
        assert_eq!(heap.count(view).unwrap(), -3);
        assert_eq!(heap.elements(view).unwrap(), &[11, 12, 13]);

        heap.elements_mut(view).unwrap()[0] = 99;
        assert_eq!(heap.get(owner, 2).unwrap(), Some(99));
    }

    #[test]
    fn test_view_of_view_is_flattened() {
        let mut heap = heap();
        let owner = heap.allocate_owner::<i32>(8).unwrap();
        let outer = heap.make_view_of(owner, 2, 6).unwrap();
        let inner = heap.make_view_of(outer, 1, 2).unwrap();

        let outer_key = heap.descriptor(outer).unwrap().liveness_ref().unwrap();
        let inner_key = heap.descriptor(inner).unwrap().liveness_ref().unwrap();
        assert_eq!(outer_key, inner_key);

        let registry = heap.registry::<i32>().unwrap();
        assert_eq!(registry.owner(inner_key), Some(owner.id()));
        assert_eq!(registry.uses(inner_key), 2);
    }

    #[test]
    fn test_failed_view_leaves_no_registry_trace() {
        let mut heap = heap();
        let owner = heap.allocate_owner::<u8>(5).unwrap();
        assert!(heap.make_view_of(owner, 3, 3).unwrap_err().is_range());
        assert!(heap.make_view_of(owner, -1, 1).unwrap_err().is_range());
        assert!(heap.make_view_of(owner, 0, -1).unwrap_err().is_range());
        assert!(heap.make_view_of(owner, isize::MAX, 2).unwrap_err().is_range());
        assert_eq!(heap.registry_stats().increments, 0);
        assert_eq!(heap.stats().live_handles, 1);
    }

    #[test]
    fn test_rolled_back_views_release_their_owner() {
        let mut heap = heap();
        let owner = heap.allocate_owner::<u32>(8).unwrap();
        let views = heap.partition_into(owner, 4).unwrap();
        assert_eq!(heap.registry::<u32>().unwrap().len(), 1);

        heap.discard_views(&views);
        assert!(views.iter().all(|v| !heap.is_live(*v)));
        assert!(heap.registry_stats().is_balanced());
        assert_eq!(heap.stats().live_handles, 1);

        heap.unroot(owner).unwrap();
        let report = heap.collect();
        assert_eq!(report.finalized, 1);
        assert_eq!(report.freed_bytes, 32);
    }

    #[test]
    fn test_empty_view_is_allowed() {
        let mut heap = heap();
        let owner = heap.allocate_owner::<u8>(5).unwrap();
        let view = heap.make_view_of(owner, 5, 0).unwrap();
        assert_eq!(heap.tag(view).unwrap(), Tag::View);
        assert_eq!(heap.count(view).unwrap(), 0);
    }

    #[test]
    fn test_external_cannot_be_sliced() {
        let mut heap = heap();
        let mut value = 0u32;
        let external = heap.wrap_external(&mut value as *mut u32).unwrap();
        assert!(heap.make_view_of(external, 0, 0).unwrap_err().is_type());
        assert!(heap.partition_into(external, 1).unwrap_err().is_type());
    }

    #[test]
    fn test_advance() {
        let mut heap = heap();
        let owner = heap.from_slice(&[1u8, 2, 3, 4]).unwrap();
        let rest = heap.advance(owner, 1).unwrap();
        assert_eq!(heap.to_vec(rest).unwrap(), vec![2, 3, 4]);
        let end = heap.advance(owner, 4).unwrap();
        assert_eq!(heap.len(end).unwrap(), 0);
        assert!(heap.advance(owner, 5).unwrap_err().is_range());
        assert!(heap.advance(owner, -1).unwrap_err().is_range());
    }

    #[test]
    fn test_partition_by_and_windows() {
        let mut heap = heap();
        let owner = heap.from_slice(&[1i64, 2, 3, 4, 5, 6]).unwrap();

        let pairs = heap.partition_by(owner, 2).unwrap();
        let pairs: Vec<_> = pairs.into_iter().map(|v| heap.to_vec(v).unwrap()).collect();
        assert_eq!(pairs, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        assert!(heap.partition_by(owner, 4).unwrap_err().is_range());
        assert!(heap.partition_by(owner, 0).unwrap_err().is_range());

        let windows = heap.windows(owner, 4).unwrap();
        let windows: Vec<_> = windows.into_iter().map(|v| heap.to_vec(v).unwrap()).collect();
        assert_eq!(windows, vec![vec![1, 2, 3, 4], vec![2, 3, 4, 5]]);
        assert!(heap.windows(owner, 6).unwrap_err().is_range());
        assert!(heap.windows(owner, 0).unwrap_err().is_range());
    }

    #[test]
    fn test_partition_of_empty_is_refused() {
        let mut heap = heap();
        let empty = heap.allocate_owner::<u8>(0).unwrap();
        assert!(heap.partition_into(empty, 1).unwrap_err().is_range());
        assert!(heap.partition_by(empty, 1).unwrap_err().is_range());
        assert!(heap.windows(empty, 1).unwrap_err().is_range());
    }
}
