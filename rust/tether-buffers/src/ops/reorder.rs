//! In-place reordering: rotate, reverse, sort and binary search.

use tether_common::{Result, error::Error, verify_range, verify_type};

use crate::element::Element;
use crate::heap::{Handle, Heap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

impl Heap {
    /// Rotates the elements by `k` positions in place and returns `handle`.
    ///
    /// `k` is taken modulo the length; rotations that reduce to zero leave
    /// the buffer untouched. Scratch space is limited to
    /// `min(k, len - k)` elements and is reserved before any element moves.
    pub fn rotate<T: Element>(
        &mut self,
        handle: Handle<T>,
        k: isize,
        direction: Direction,
    ) -> Result<Handle<T>> {
        let elements = self.array_mut(handle, "rotate")?;
        verify_range!(k, k >= 0);
        let n = elements.len();
        if n == 0 {
            return Ok(handle);
        }
        let k = k as usize % n;
        if k == 0 {
            return Ok(handle);
        }
        let mid = match direction {
            Direction::Left => k,
            Direction::Right => n - k,
        };
        rotate_left_bounded(elements, mid)?;
        Ok(handle)
    }

    pub fn reverse<T: Element>(&mut self, handle: Handle<T>) -> Result<Handle<T>> {
        self.array_mut(handle, "reverse")?.reverse();
        Ok(handle)
    }

    /// Sorts in place by the element's native ordering. Refuses empty buffers.
    pub fn sort<T: Element>(&mut self, handle: Handle<T>) -> Result<Handle<T>> {
        let elements = self.array_mut(handle, "sort")?;
        verify_type!(sort, !elements.is_empty());
        elements.sort_unstable_by(T::compare);
        Ok(handle)
    }

    /// Binary search for `key`, returning the 1-based index of a match.
    ///
    /// The buffer must already be sorted by the native ordering; this is not
    /// checked, and an unsorted buffer gives an unspecified answer.
    pub fn search<T: Element>(&self, handle: Handle<T>, key: T) -> Result<Option<usize>> {
        let elements = self.array(handle, "search")?;
        Ok(elements
            .binary_search_by(|e| e.compare(&key))
            .ok()
            .map(|i| i + 1))
    }
}

/// Rotates `elements` left by `mid` elements, `0 < mid < len`, through a
/// scratch buffer holding the shorter of the two sides.
fn rotate_left_bounded<T: Copy>(elements: &mut [T], mid: usize) -> Result<()> {
    let n = elements.len();
    let tail = n - mid;
    let scratch_len = mid.min(tail);

    let mut scratch = Vec::new();
    scratch
        .try_reserve_exact(scratch_len)
        .map_err(|_| Error::allocation(scratch_len * std::mem::size_of::<T>()))?;

    if mid <= tail {
        scratch.extend_from_slice(&elements[..mid]);
        elements.copy_within(mid.., 0);
        elements[tail..].copy_from_slice(&scratch);
    } else {
        scratch.extend_from_slice(&elements[mid..]);
        elements.copy_within(..mid, tail);
        elements[..tail].copy_from_slice(&scratch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> Heap {
        Heap::builder()
            .with_standard_types()
            .without_auto_collect()
            .build()
            .unwrap()
    }

    #[test]
    fn test_rotate_left_bounded() {
        for n in 2..9usize {
            for mid in 1..n {
                let mut values: Vec<usize> = (0..n).collect();
                rotate_left_bounded(&mut values, mid).unwrap();
                let mut expected: Vec<usize> = (0..n).collect();
                expected.rotate_left(mid);
                assert_eq!(values, expected, "n={n} mid={mid}");
            }
        }
    }

    #[test]
    fn test_rotate_directions() {
        let mut heap = heap();
        let h = heap.from_slice(&[1u8, 2, 3, 4, 5]).unwrap();
        heap.rotate(h, 2, Direction::Left).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![3, 4, 5, 1, 2]);
        heap.rotate(h, 1, Direction::Right).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![2, 3, 4, 5, 1]);
        heap.rotate(h, 6, Direction::Right).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_rotate_edge_cases() {
        let mut heap = heap();
        let h = heap.from_slice(&[1u8, 2, 3]).unwrap();
        assert!(heap.rotate(h, -1, Direction::Left).unwrap_err().is_range());
        assert_eq!(heap.rotate(h, 0, Direction::Left).unwrap(), h);
        heap.rotate(h, 3, Direction::Left).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![1, 2, 3]);

        let empty = heap.allocate_owner::<u8>(0).unwrap();
        heap.rotate(empty, 4, Direction::Left).unwrap();
    }

    #[test]
    fn test_rotate_inside_view() {
        let mut heap = heap();
        let owner = heap.from_slice(&[0i32, 1, 2, 3, 4, 5]).unwrap();
        let middle = heap.make_view_of(owner, 1, 4).unwrap();
        heap.rotate(middle, 1, Direction::Left).unwrap();
        assert_eq!(heap.to_vec(owner).unwrap(), vec![0, 2, 3, 4, 1, 5]);
    }

    #[test]
    fn test_reverse() {
        let mut heap = heap();
        let h = heap.from_slice(&[1u64, 2, 3, 4]).unwrap();
        heap.reverse(h).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![4, 3, 2, 1]);
        let empty = heap.allocate_owner::<u64>(0).unwrap();
        heap.reverse(empty).unwrap();
    }

    #[test]
    fn test_sort_and_search() {
        let mut heap = heap();
        let h = heap.from_slice(&[3.5f32, -1.0, 2.0, 10.0]).unwrap();
        heap.sort(h).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![-1.0, 2.0, 3.5, 10.0]);
        assert_eq!(heap.search(h, 3.5).unwrap(), Some(3));
        assert_eq!(heap.search(h, -1.0).unwrap(), Some(1));
        assert_eq!(heap.search(h, 4.0).unwrap(), None);

        let empty = heap.allocate_owner::<f32>(0).unwrap();
        assert!(heap.sort(empty).unwrap_err().is_type());
        assert_eq!(heap.search(empty, 1.0).unwrap(), None);
    }
}
