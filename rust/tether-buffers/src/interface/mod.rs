//! Entry points used by the calling-convention glue and by text transcoding:
//! creating handles from native values and resolving handles back to native
//! addresses.

mod text;

use std::ptr::NonNull;

use tether_common::{Result, error::Error};

use crate::descriptor::{BufferDescriptor, Tag};
use crate::element::{Element, ElementKind};
use crate::heap::{Handle, HandleId, Heap};

impl Heap {
    /// Allocates a zero-filled owner of `count` elements.
    pub fn allocate_owner<T: Element>(&mut self, count: usize) -> Result<Handle<T>> {
        let block = self.alloc_block::<T>(count)?;
        let handle = self.insert_owner(block, count)?;
        self.maybe_collect();
        Ok(handle)
    }

    /// A new owner holding a copy of `values`.
    pub fn from_slice<T: Element>(&mut self, values: &[T]) -> Result<Handle<T>> {
        let mut block = self.alloc_block::<T>(values.len())?;
        block.typed_data_mut::<T>().copy_from_slice(values);
        let handle = self.insert_owner(block, values.len())?;
        self.maybe_collect();
        Ok(handle)
    }

    /// Wraps a buffer produced by native code as an owner.
    ///
    /// The elements are moved into memory managed by the heap, aligned for
    /// native consumers.
    pub fn native_value_to_handle<T: Element>(&mut self, values: Vec<T>) -> Result<Handle<T>> {
        self.from_slice(&values)
    }

    /// Wraps a foreign address the heap neither allocated nor bounds-tracks.
    ///
    /// Finalizing the handle leaves the memory alone. Only
    /// [`Heap::read_pointee`], [`Heap::write_pointee`], [`Heap::equal`] and
    /// the pointer accessors accept external handles.
    pub fn wrap_external<T: Element>(&mut self, ptr: *mut T) -> Result<Handle<T>> {
        let descriptor = BufferDescriptor::make_external(ptr.cast())?;
        self.insert(descriptor)
    }

    /// Size of the handle's elements in bytes; zero for external pointers.
    pub fn byte_len<T: Element>(&self, handle: Handle<T>) -> Result<usize> {
        Ok(self.descriptor(handle)?.byte_len(std::mem::size_of::<T>()))
    }

    /// Resolves a handle passed to a native function expecting elements of
    /// `expected` kind.
    ///
    /// Fails with a `TypeError` when the handle holds another element kind.
    pub fn handle_to_native_pointer(&self, id: HandleId, expected: ElementKind) -> Result<*mut u8> {
        let actual = self.element_type(id)?.kind();
        if actual != expected {
            return Err(Error::type_error(
                expected.to_string(),
                format!("handle {id} holds {actual} elements"),
            ));
        }
        Ok(self.cell(id)?.descriptor.base().as_ptr())
    }

    /// Typed counterpart of [`Heap::handle_to_native_pointer`].
    pub fn native_pointer<T: Element>(&self, id: HandleId) -> Result<NonNull<T>> {
        let handle = self.downcast::<T>(id)?;
        Ok(self.descriptor(handle)?.base().cast())
    }

    /// Reads the value an external handle points to.
    ///
    /// # Safety
    ///
    /// The foreign address must be valid for reading one `T`. It need not be
    /// aligned.
    pub unsafe fn read_pointee<T: Element>(&self, handle: Handle<T>) -> Result<T> {
        let base = self.external_base(handle, "read_pointee")?;
        Ok(unsafe { base.as_ptr().read_unaligned() })
    }

    /// Writes the value an external handle points to.
    ///
    /// # Safety
    ///
    /// The foreign address must be valid for writing one `T`. It need not be
    /// aligned.
    pub unsafe fn write_pointee<T: Element>(&mut self, handle: Handle<T>, value: T) -> Result<()> {
        let base = self.external_base(handle, "write_pointee")?;
        unsafe { base.as_ptr().write_unaligned(value) };
        Ok(())
    }

    fn external_base<T: Element>(&self, handle: Handle<T>, op: &str) -> Result<NonNull<T>> {
        let descriptor = self.descriptor(handle)?;
        if descriptor.tag() != Tag::External {
            return Err(Error::type_error(
                op,
                "only external pointers can be dereferenced; index arrays instead",
            ));
        }
        Ok(descriptor.base().cast())
    }
}
