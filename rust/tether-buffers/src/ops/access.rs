use tether_common::{Result, error::Error};

use super::position;
use crate::element::Element;
use crate::heap::{Handle, Heap};

impl Heap {
    /// Reads the element at the 1-based `index`.
    ///
    /// An index outside `[1, len]` is not an error: it reads as `None`.
    pub fn get<T: Element>(&self, handle: Handle<T>, index: isize) -> Result<Option<T>> {
        let elements = self.array(handle, "get")?;
        Ok(position(index, elements.len()).map(|i| elements[i]))
    }

    /// Writes the element at the 1-based `index`; `RangeError` outside
    /// `[1, len]`.
    pub fn set<T: Element>(&mut self, handle: Handle<T>, index: isize, value: T) -> Result<()> {
        let elements = self.array_mut(handle, "set")?;
        let len = elements.len();
        let i = position(index, len).ok_or_else(|| {
            Error::range("index", format!("{index} is outside [1, {len}]"))
        })?;
        elements[i] = value;
        Ok(())
    }

    pub fn fill<T: Element>(&mut self, handle: Handle<T>, value: T) -> Result<()> {
        self.array_mut(handle, "fill")?.fill(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::element::Record;
    use crate::heap::Heap;

    fn heap() -> Heap {
        Heap::builder()
            .with_standard_types()
            .register_record::<3>("rgb")
            .without_auto_collect()
            .build()
            .unwrap()
    }

    #[test]
    fn test_lenient_read_strict_write() {
        let mut heap = heap();
        let h = heap.from_slice(&[5u32, 6, 7]).unwrap();
        assert_eq!(heap.get(h, 1).unwrap(), Some(5));
        assert_eq!(heap.get(h, 3).unwrap(), Some(7));
        assert_eq!(heap.get(h, 0).unwrap(), None);
        assert_eq!(heap.get(h, 4).unwrap(), None);

        heap.set(h, 2, 60).unwrap();
        assert_eq!(heap.to_vec(h).unwrap(), vec![5, 60, 7]);
        assert!(heap.set(h, 4, 1).unwrap_err().is_range());
        assert!(heap.set(h, 0, 1).unwrap_err().is_range());
        assert_eq!(heap.to_vec(h).unwrap(), vec![5, 60, 7]);
    }

    #[test]
    fn test_fill_records() {
        let mut heap = heap();
        let h = heap.allocate_owner::<Record<3>>(4).unwrap();
        assert_eq!(heap.get(h, 4).unwrap(), Some(Record::default()));
        heap.fill(h, Record([1, 2, 3])).unwrap();
        assert!(heap.to_vec(h).unwrap().iter().all(|r| r.0 == [1, 2, 3]));
        assert_eq!(heap.byte_len(h).unwrap(), 12);
    }

    #[test]
    fn test_access_refuses_external() {
        let mut heap = heap();
        let mut slot = 1.5f64;
        let external = heap.wrap_external(&mut slot as *mut f64).unwrap();
        assert!(heap.get(external, 1).unwrap_err().is_type());
        assert!(heap.set(external, 1, 2.0).unwrap_err().is_type());
        assert!(heap.fill(external, 2.0).unwrap_err().is_type());
    }
}
