//! Equality, prefix ordering and address-range predicates.

use std::cmp::Ordering;

use tether_bytes::AddressRange;
use tether_common::Result;

use crate::descriptor::{BufferDescriptor, Tag};
use crate::element::Element;
use crate::heap::{Handle, Heap};

impl Heap {
    /// Structural equality: same length and the same bytes.
    ///
    /// Handles sharing a base address and length are equal without looking at
    /// the elements. External pointers are equal only to an external pointer
    /// with the same address.
    pub fn equal<T: Element>(&self, a: Handle<T>, b: Handle<T>) -> Result<bool> {
        let (da, db) = (self.descriptor(a)?, self.descriptor(b)?);
        match (da.tag(), db.tag()) {
            (Tag::External, Tag::External) => return Ok(da.base() == db.base()),
            (Tag::External, _) | (_, Tag::External) => return Ok(false),
            _ => {}
        }
        if da.len() != db.len() {
            return Ok(false);
        }
        if da.base() == db.base() {
            return Ok(true);
        }
        let x: &[u8] = bytemuck::cast_slice(self.array(a, "equal")?);
        let y: &[u8] = bytemuck::cast_slice(self.array(b, "equal")?);
        Ok(x == y)
    }

    /// Orders `a` and `b` by their first differing element within the shared
    /// prefix of `min(len(a), len(b))` elements.
    ///
    /// When the shared prefix is equal the result is `Equal`, whatever the
    /// lengths: `[1, 2]` and `[1, 2, 3]` compare equal.
    pub fn compare_prefix<T: Element>(&self, a: Handle<T>, b: Handle<T>) -> Result<Ordering> {
        self.prefix_order(a, b, "compare_prefix")
    }

    /// `a < b` under [`Heap::compare_prefix`].
    pub fn less<T: Element>(&self, a: Handle<T>, b: Handle<T>) -> Result<bool> {
        Ok(self.prefix_order(a, b, "less")? == Ordering::Less)
    }

    /// `a <= b` under [`Heap::compare_prefix`].
    pub fn less_equal<T: Element>(&self, a: Handle<T>, b: Handle<T>) -> Result<bool> {
        Ok(self.prefix_order(a, b, "less_equal")? != Ordering::Greater)
    }

    /// Returns `true` if the memory of `inner` lies within the memory of
    /// `outer`. Always `false` when either is an external pointer.
    pub fn contains<T: Element>(&self, outer: Handle<T>, inner: Handle<T>) -> Result<bool> {
        let outer = address_range::<T>(self.descriptor(outer)?);
        let inner = address_range::<T>(self.descriptor(inner)?);
        Ok(matches!((outer, inner), (Some(o), Some(i)) if o.contains(&i)))
    }

    /// Returns `true` if `a` and `b` share at least one element of memory.
    pub fn overlaps<T: Element>(&self, a: Handle<T>, b: Handle<T>) -> Result<bool> {
        let a = address_range::<T>(self.descriptor(a)?);
        let b = address_range::<T>(self.descriptor(b)?);
        Ok(matches!((a, b), (Some(a), Some(b)) if a.overlaps(&b)))
    }

    fn prefix_order<T: Element>(&self, a: Handle<T>, b: Handle<T>, op: &str) -> Result<Ordering> {
        let x = self.array(a, op)?;
        let y = self.array(b, op)?;
        Ok(x.iter()
            .zip(y)
            .map(|(p, q)| p.compare(q))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal))
    }
}

fn address_range<T: Element>(descriptor: &BufferDescriptor) -> Option<AddressRange> {
    (descriptor.tag() != Tag::External).then(|| {
        AddressRange::new(
            descriptor.base().as_ptr(),
            descriptor.byte_len(std::mem::size_of::<T>()),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use crate::heap::Heap;

    fn heap() -> Heap {
        Heap::builder()
            .with_standard_types()
            .without_auto_collect()
            .build()
            .unwrap()
    }

    #[test]
    fn test_equal_is_structural() {
        let mut heap = heap();
        let a = heap.from_slice(&[1i16, 2, 3, 1, 2]).unwrap();
        let b = heap.from_slice(&[1i16, 2]).unwrap();
        let head = heap.make_view_of(a, 0, 2).unwrap();
        let tail = heap.make_view_of(a, 3, 2).unwrap();
        assert!(heap.equal(head, b).unwrap());
        assert!(heap.equal(head, tail).unwrap());
        assert!(heap.equal(a, a).unwrap());
        assert!(!heap.equal(a, b).unwrap());
    }

    #[test]
    fn test_equal_on_external_is_identity() {
        let mut heap = heap();
        let mut values = [7u8, 7];
        let x = heap.wrap_external(values.as_mut_ptr()).unwrap();
        let y = heap.wrap_external(values.as_mut_ptr()).unwrap();
        let z = heap.wrap_external(values[1..].as_mut_ptr()).unwrap();
        let owner = heap.from_slice(&[]).unwrap();
        assert!(heap.equal(x, y).unwrap());
        assert!(!heap.equal(x, z).unwrap());
        assert!(!heap.equal(x, owner).unwrap());
        assert!(heap.less(x, y).unwrap_err().is_type());
    }

    #[test]
    fn test_float_ordering_is_total() {
        let mut heap = heap();
        let a = heap.from_slice(&[1.0f64, f64::NAN]).unwrap();
        let b = heap.from_slice(&[1.0f64, f64::INFINITY]).unwrap();
        assert_eq!(heap.compare_prefix(a, b).unwrap(), Ordering::Greater);
        assert!(heap.less(b, a).unwrap());
        assert!(heap.less_equal(a, a).unwrap());
    }

    #[test]
    fn test_contains_and_overlaps() {
        let mut heap = heap();
        let owner = heap.allocate_owner::<u32>(10).unwrap();
        let left = heap.make_view_of(owner, 0, 6).unwrap();
        let right = heap.make_view_of(owner, 4, 6).unwrap();
        let far = heap.make_view_of(owner, 6, 4).unwrap();
        let other = heap.allocate_owner::<u32>(10).unwrap();

        assert!(heap.contains(owner, left).unwrap());
        assert!(!heap.contains(left, owner).unwrap());
        assert!(heap.overlaps(left, right).unwrap());
        assert!(!heap.overlaps(left, far).unwrap());
        assert!(!heap.overlaps(owner, other).unwrap());

        let mut word = 0u32;
        let external = heap.wrap_external(&mut word as *mut u32).unwrap();
        assert!(!heap.contains(owner, external).unwrap());
        assert!(!heap.overlaps(external, external).unwrap());
    }
}
