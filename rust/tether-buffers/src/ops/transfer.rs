//! Copies, concatenation, overlap-safe moves and descriptor swaps.

use tether_bytes::region::move_bytes;
use tether_common::{Result, error::Error, verify_range};

use crate::element::Element;
use crate::heap::{Handle, Heap};

impl Heap {
    /// A new owner holding the elements of `a` followed by those of `b`.
    pub fn concat<T: Element>(&mut self, a: Handle<T>, b: Handle<T>) -> Result<Handle<T>> {
        let x = self.array(a, "concat")?;
        let y = self.array(b, "concat")?;
        let total = x
            .len()
            .checked_add(y.len())
            .ok_or_else(|| Error::range("concat", "combined length overflows"))?;
        let mut block = self.alloc_block::<T>(total)?;
        let out = block.typed_data_mut::<T>();
        out[..x.len()].copy_from_slice(x);
        out[x.len()..].copy_from_slice(y);

        let handle = self.insert_owner(block, total)?;
        self.maybe_collect();
        Ok(handle)
    }

    /// A new owner holding a copy of the elements of `handle`.
    pub fn copy<T: Element>(&mut self, handle: Handle<T>) -> Result<Handle<T>> {
        let source = self.array(handle, "copy")?;
        let len = source.len();
        let mut block = self.alloc_block::<T>(len)?;
        block.typed_data_mut::<T>().copy_from_slice(source);

        let copy = self.insert_owner(block, len)?;
        self.maybe_collect();
        Ok(copy)
    }

    /// Moves the 1-based, end-exclusive range `[from, to)` of `source` to the
    /// 1-based position `dest` of `target` (or of `source` itself).
    ///
    /// Overlapping ranges are handled as if the elements were first copied to
    /// a temporary buffer, including when `source` and `target` are distinct
    /// views of one owner. Returns the handle that was written.
    pub fn move_range<T: Element>(
        &mut self,
        source: Handle<T>,
        from: isize,
        to: isize,
        dest: isize,
        target: Option<Handle<T>>,
    ) -> Result<Handle<T>> {
        let target = target.unwrap_or(source);
        let (src, src_len) = self.array_parts(source, "move")?;
        let (dst, dst_len) = self.array_parts(target, "move")?;

        verify_range!(from, from >= 1);
        verify_range!(to, to >= from);
        verify_range!(dest, dest >= 1);
        let (start, end, at) = ((from - 1) as usize, (to - 1) as usize, (dest - 1) as usize);
        if end > src_len {
            return Err(Error::range(
                "to",
                format!("range [{from}, {to}) exceeds {src_len} elements"),
            ));
        }
        let count = end - start;
        if at.checked_add(count).is_none_or(|end| end > dst_len) {
            return Err(Error::range(
                "dest",
                format!("{count} elements at {dest} exceed {dst_len} elements"),
            ));
        }

        let size = std::mem::size_of::<T>();
        // SAFETY: both ranges were checked against their handles' lengths and
        // both handles are live, so their memory is still allocated.
        unsafe {
            move_bytes(
                src.as_ptr().add(start) as *const u8,
                dst.as_ptr().add(at) as *mut u8,
                count * size,
            );
        }
        Ok(target)
    }

    /// Exchanges the descriptors of `a` and `b` without touching elements.
    ///
    /// Afterwards `a` owns or views what `b` did and the other way round.
    /// Registry keys are rebound so that views keep their memory alive through
    /// whichever handle now holds it.
    pub fn swap<T: Element>(&mut self, a: Handle<T>, b: Handle<T>) -> Result<()> {
        let type_index = self.typed_cell(a)?.type_index;
        self.typed_cell(b)?;
        if a == b {
            return Ok(());
        }
        self.swap_descriptors(a.id(), b.id())?;
        self.registry_mut(type_index).rebind_swapped(a.id(), b.id());
        Ok(())
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
    fn test_concat() {
        let mut heap = heap();
        let a = heap.from_slice(&[1u16, 2]).unwrap();
        let b = heap.from_slice(&[3u16, 4, 5]).unwrap();
        let view = heap.make_view_of(b, 1, 2).unwrap();
        let joined = heap.concat(a, view).unwrap();
        assert_eq!(heap.tag(joined).unwrap(), Tag::Owner);
        assert_eq!(heap.to_vec(joined).unwrap(), vec![1, 2, 4, 5]);

        let mut raw = 0u16;
        let external = heap.wrap_external(&mut raw as *mut u16).unwrap();
        assert!(heap.concat(a, external).unwrap_err().is_type());
    }

    #[test]
    fn test_copy_is_independent() {
        let mut heap = heap();
        let h = heap.from_slice(&[9i8, 8, 7]).unwrap();
        let c = heap.copy(h).unwrap();
        assert!(heap.equal(h, c).unwrap());
        assert_ne!(
            heap.descriptor(h).unwrap().base(),
            heap.descriptor(c).unwrap().base()
        );
        heap.set(c, 1, 0).unwrap();
        assert_eq!(heap.get(h, 1).unwrap(), Some(9));
    }

    #[test]
    fn test_move_range_bounds() {
        let mut heap = heap();
        let h = heap.from_slice(&[1u32, 2, 3, 4]).unwrap();
        assert!(heap.move_range(h, 0, 2, 1, None).unwrap_err().is_range());
        assert!(heap.move_range(h, 3, 2, 1, None).unwrap_err().is_range());
        assert!(heap.move_range(h, 1, 6, 1, None).unwrap_err().is_range());
        assert!(heap.move_range(h, 1, 3, 4, None).unwrap_err().is_range());
        assert!(heap.move_range(h, 1, 3, 0, None).unwrap_err().is_range());
        assert_eq!(heap.to_vec(h).unwrap(), vec![1, 2, 3, 4]);

        heap.move_range(h, 1, 3, 3, None).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![1, 2, 1, 2]);
        heap.move_range(h, 2, 2, 4, None).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_move_between_handles() {
        let mut heap = heap();
        let src = heap.from_slice(&[1u32, 2, 3]).unwrap();
        let dst = heap.allocate_owner::<u32>(4).unwrap();
        let written = heap.move_range(src, 2, 4, 3, Some(dst)).unwrap();
        assert_eq!(written, dst);
        assert_eq!(heap.to_vec(dst).unwrap(), vec![0, 0, 2, 3]);
        assert_eq!(heap.to_vec(src).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_swap_with_itself_is_noop() {
        let mut heap = heap();
        let h = heap.from_slice(&[1u8]).unwrap();
        heap.swap(h, h).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![1]);
    }

    #[test]
    fn test_swap_keeps_views_alive() {
        let mut heap = heap();
        let owner = heap.from_slice(&[1u8, 2, 3, 4]).unwrap();
        let view = heap.make_view_of(owner, 1, 2).unwrap();
        let other = heap.from_slice(&[7u8]).unwrap();

        heap.swap(owner, other).unwrap();
        assert_eq!(heap.to_vec(other).unwrap(), vec![1, 2, 3, 4]);

        // `owner` now holds the single-element buffer and nothing depends on it.
        heap.unroot(owner).unwrap();
        heap.unroot(other).unwrap();
        heap.collect_full();
        assert!(!heap.is_live(owner));
        assert!(heap.is_live(other));
        assert_eq!(heap.to_vec(view).unwrap(), vec![2, 3]);

        heap.unroot(view).unwrap();
        heap.collect_full();
        assert_eq!(heap.stats().live_handles, 0);
        assert!(heap.registry_stats().is_balanced());
    }
}
