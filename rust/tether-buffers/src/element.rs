//! The closed set of native element kinds a buffer can hold.

use std::cmp::Ordering;
use std::fmt;

/// Identifies the native layout of a buffer's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// A fixed-size record of `size` raw bytes.
    Record { size: usize },
}

impl ElementKind {
    /// Size of a single element in bytes.
    pub fn size(&self) -> usize {
        match self {
            ElementKind::I8 | ElementKind::U8 => 1,
            ElementKind::I16 | ElementKind::U16 => 2,
            ElementKind::I32 | ElementKind::U32 | ElementKind::F32 => 4,
            ElementKind::I64 | ElementKind::U64 | ElementKind::F64 => 8,
            ElementKind::Record { size } => *size,
        }
    }

    /// The C spelling of the kind, used as the default registration name.
    pub fn native_name(&self) -> &'static str {
        match self {
            ElementKind::I8 => "int8_t",
            ElementKind::I16 => "int16_t",
            ElementKind::I32 => "int32_t",
            ElementKind::I64 => "int64_t",
            ElementKind::U8 => "uint8_t",
            ElementKind::U16 => "uint16_t",
            ElementKind::U32 => "uint32_t",
            ElementKind::U64 => "uint64_t",
            ElementKind::F32 => "float",
            ElementKind::F64 => "double",
            ElementKind::Record { .. } => "record",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Record { size } => write!(f, "record[{size}]"),
            kind => f.write_str(kind.native_name()),
        }
    }
}

/// A native element type that buffers can hold.
///
/// Every buffer operation is generic over `T: Element` and monomorphized per
/// kind. `compare` is the element's native ordering; it must be a total order
/// because it drives in-place sorting and binary search.
pub trait Element: bytemuck::Pod + PartialEq + fmt::Debug + 'static {
    const KIND: ElementKind;

    fn compare(&self, other: &Self) -> Ordering;
}

macro_rules! impl_integer_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const KIND: ElementKind = ElementKind::$kind;

                #[inline]
                fn compare(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

impl_integer_element!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

impl Element for f32 {
    const KIND: ElementKind = ElementKind::F32;

    #[inline]
    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::F64;

    #[inline]
    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

/// A fixed-layout record of `N` bytes, ordered bytewise.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Record<const N: usize>(pub [u8; N]);

impl<const N: usize> Record<N> {
    pub fn new(bytes: [u8; N]) -> Self {
        Record(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> Default for Record<N> {
    fn default() -> Self {
        Record([0; N])
    }
}

impl<const N: usize> fmt::Debug for Record<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Record").field(&self.0.as_slice()).finish()
    }
}

// SAFETY: `Record<N>` is a transparent wrapper over `[u8; N]`: no padding, and
// every bit pattern is valid.
unsafe impl<const N: usize> bytemuck::Zeroable for Record<N> {}
unsafe impl<const N: usize> bytemuck::Pod for Record<N> {}

impl<const N: usize> Element for Record<N> {
    const KIND: ElementKind = ElementKind::Record { size: N };

    #[inline]
    fn compare(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_sizes_match_rust_layout() {
        assert_eq!(<i16 as Element>::KIND.size(), std::mem::size_of::<i16>());
        assert_eq!(<u64 as Element>::KIND.size(), std::mem::size_of::<u64>());
        assert_eq!(<f32 as Element>::KIND.size(), std::mem::size_of::<f32>());
        assert_eq!(
            <Record<12> as Element>::KIND.size(),
            std::mem::size_of::<Record<12>>()
        );
    }

    #[test]
    fn test_float_order_is_total() {
        assert_eq!(f64::NAN.compare(&f64::INFINITY), Ordering::Greater);
        assert_eq!((-0.0f64).compare(&0.0), Ordering::Less);
        assert_eq!(1.5f32.compare(&1.5), Ordering::Equal);
    }

    #[test]
    fn test_record_order_is_bytewise() {
        let a = Record::new([1, 2, 3]);
        let b = Record::new([1, 3, 0]);
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(ElementKind::Record { size: 3 }.to_string(), "record[3]");
        assert_eq!(ElementKind::U16.to_string(), "uint16_t");
    }
}
