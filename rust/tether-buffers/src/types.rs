//! Element type registration and heap configuration.
//!
//! Every element type a heap can hold is registered up front through
//! [`HeapBuilder`]; the resulting [`TypeTable`] is owned by the heap rather
//! than living in process-wide state. Each registered type gets its own
//! ownership registry.

use std::any::TypeId;

use ahash::AHashMap;
use tether_common::{Result, error::Error};

use crate::element::{Element, ElementKind, Record};
use crate::heap::Heap;

/// Default amount of owned bytes allocated between two automatic collections.
pub const DEFAULT_GC_STEP_BYTES: usize = 8 * 1024 * 1024;

/// Position of a registered element type in the heap's [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIndex(u32);

impl TypeIndex {
    #[inline]
    pub(crate) fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// A registered element type.
#[derive(Debug, Clone)]
pub struct ElementType {
    name: String,
    kind: ElementKind,
    size: usize,
    align: usize,
}

impl ElementType {
    /// The name the type was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Element size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Element alignment in bytes.
    pub fn align(&self) -> usize {
        self.align
    }
}

#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    types: Vec<ElementType>,
    by_type_id: AHashMap<TypeId, TypeIndex>,
    by_name: AHashMap<String, TypeIndex>,
}

impl TypeTable {
    pub fn new() -> TypeTable {
        Default::default()
    }

    /// Registers `T` under `name`.
    ///
    /// Fails with a `TypeError` when the name is taken, when `T` is already
    /// registered, or when `T` is zero-sized.
    pub fn register<T: Element>(&mut self, name: impl Into<String>) -> Result<TypeIndex> {
        let name = name.into();
        let type_id = TypeId::of::<T>();
        if self.by_name.contains_key(&name) {
            return Err(Error::type_error(name, "element type name is already registered"));
        }
        if self.by_type_id.contains_key(&type_id) {
            return Err(Error::type_error(
                name,
                format!("{} is already registered under another name", T::KIND),
            ));
        }
        if std::mem::size_of::<T>() == 0 {
            return Err(Error::type_error(name, "zero-sized element types are not supported"));
        }

        let index = u32::try_from(self.types.len())
            .map(TypeIndex)
            .map_err(|_| Error::invalid_operation("type table is full"))?;
        self.types.push(ElementType {
            name: name.clone(),
            kind: T::KIND,
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
        });
        self.by_type_id.insert(type_id, index);
        self.by_name.insert(name, index);
        Ok(index)
    }

    /// Returns the index of `T`, if registered.
    pub fn index_of<T: Element>(&self) -> Option<TypeIndex> {
        self.by_type_id.get(&TypeId::of::<T>()).copied()
    }

    /// Resolves `T` or fails with a `TypeError` naming the missing kind.
    pub(crate) fn require<T: Element>(&self) -> Result<TypeIndex> {
        self.index_of::<T>().ok_or_else(|| {
            Error::type_error(T::KIND.to_string(), "element type is not registered")
        })
    }

    pub fn get(&self, index: TypeIndex) -> Option<&ElementType> {
        self.types.get(index.as_usize())
    }

    /// Looks a registered type up by name.
    pub fn by_name(&self, name: &str) -> Option<&ElementType> {
        self.by_name.get(name).and_then(|&index| self.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Collector tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcOptions {
    /// Owned bytes allocated between automatic collection cycles; `None`
    /// disables automatic collection.
    pub step_bytes: Option<usize>,
}

impl Default for GcOptions {
    fn default() -> Self {
        GcOptions {
            step_bytes: Some(DEFAULT_GC_STEP_BYTES),
        }
    }
}

/// Builds a [`Heap`] with an explicit set of element types.
///
/// Registration errors are remembered and reported by [`HeapBuilder::build`],
/// so calls can be chained.
#[derive(Debug, Default)]
pub struct HeapBuilder {
    types: TypeTable,
    options: GcOptions,
    error: Option<Error>,
}

impl HeapBuilder {
    pub fn new() -> HeapBuilder {
        Default::default()
    }

    /// Registers `T` under `name`.
    pub fn register<T: Element>(mut self, name: impl Into<String>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.types.register::<T>(name) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Registers `Record<N>` under `name`.
    pub fn register_record<const N: usize>(self, name: impl Into<String>) -> Self {
        self.register::<Record<N>>(name)
    }

    /// Registers every integral and floating-point kind under its C name.
    pub fn with_standard_types(self) -> Self {
        self.register::<i8>(ElementKind::I8.native_name())
            .register::<i16>(ElementKind::I16.native_name())
            .register::<i32>(ElementKind::I32.native_name())
            .register::<i64>(ElementKind::I64.native_name())
            .register::<u8>(ElementKind::U8.native_name())
            .register::<u16>(ElementKind::U16.native_name())
            .register::<u32>(ElementKind::U32.native_name())
            .register::<u64>(ElementKind::U64.native_name())
            .register::<f32>(ElementKind::F32.native_name())
            .register::<f64>(ElementKind::F64.native_name())
    }

    /// Sets the number of owned bytes allocated between automatic collections.
    pub fn gc_step_bytes(mut self, bytes: usize) -> Self {
        self.options.step_bytes = Some(bytes.max(1));
        self
    }

    /// Disables automatic collection; only explicit `collect` calls reclaim.
    pub fn without_auto_collect(mut self) -> Self {
        self.options.step_bytes = None;
        self
    }

    pub fn options(mut self, options: GcOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<Heap> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Heap::new(self.types, self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_types() {
        let heap = HeapBuilder::new().with_standard_types().build().unwrap();
        let types = heap.types();
        assert_eq!(types.len(), 10);
        let double = types.by_name("double").unwrap();
        assert_eq!(double.kind(), ElementKind::F64);
        assert_eq!(double.size(), 8);
        assert!(types.index_of::<u16>().is_some());
        assert!(types.index_of::<Record<4>>().is_none());
    }

    #[test]
    fn test_duplicate_name_is_reported_by_build() {
        let err = HeapBuilder::new()
            .register::<i32>("int")
            .register::<i64>("int")
            .build()
            .unwrap_err();
        assert!(err.is_type());
    }

    #[test]
    fn test_duplicate_type_is_rejected() {
        let mut table = TypeTable::new();
        table.register::<u8>("byte").unwrap();
        assert!(table.register::<u8>("uchar").unwrap_err().is_type());
    }

    #[test]
    fn test_zero_sized_record_is_rejected() {
        let mut table = TypeTable::new();
        assert!(table.register::<Record<0>>("nothing").unwrap_err().is_type());
    }

    #[test]
    fn test_gc_options() {
        assert_eq!(GcOptions::default().step_bytes, Some(DEFAULT_GC_STEP_BYTES));
        let heap = HeapBuilder::new().without_auto_collect().build().unwrap();
        assert_eq!(heap.options().step_bytes, None);
    }
}
