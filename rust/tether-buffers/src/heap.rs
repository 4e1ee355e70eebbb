//! The handle table and the tracing collector it is governed by.
//!
//! A [`Heap`] stands in for the host runtime's garbage-collected heap. Every
//! buffer the host can see is a handle stored here. A handle is reachable when
//! the host holds a root on it (stack slots, globals) or when an ownership
//! registry holds it on behalf of views; there are no other edges, because
//! handles never reference each other directly. [`Heap::collect`] runs one
//! stop-the-world mark-and-sweep cycle and invokes the lifecycle hook exactly
//! once for every handle found unreachable.
//!
//! Host references are plain [`HandleId`]s. Slots are reused with a bumped
//! generation, so an id that outlived its handle is reported as stale instead
//! of resolving to somebody else's memory.
//!
//! The heap is single-threaded: it is neither `Send` nor `Sync`, and all
//! mutation goes through `&mut Heap`.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use tether_bytes::NativeBlock;
use tether_common::{Result, error::Error};

use crate::descriptor::{BufferDescriptor, MAX_ELEMENT_COUNT, Ownership, Tag};
use crate::element::Element;
use crate::lifecycle::{self, Finalized};
use crate::registry::{OwnershipRegistry, RegistryStats};
use crate::types::{ElementType, GcOptions, HeapBuilder, TypeIndex, TypeTable};

/// Untyped host reference to a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId {
    index: u32,
    generation: u32,
}

impl HandleId {
    pub fn from_parts(index: u32, generation: u32) -> HandleId {
        HandleId { index, generation }
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

/// Typed host reference to a handle whose elements are `T`.
pub struct Handle<T> {
    id: HandleId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(id: HandleId) -> Handle<T> {
        Handle {
            id,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.id).finish()
    }
}

impl<T> From<Handle<T>> for HandleId {
    fn from(handle: Handle<T>) -> HandleId {
        handle.id
    }
}

#[derive(Debug)]
pub(crate) struct HandleCell {
    pub(crate) descriptor: BufferDescriptor,
    pub(crate) type_index: TypeIndex,
    roots: u32,
    marked: bool,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    cell: Option<HandleCell>,
}

/// Snapshot of the heap's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub live_handles: usize,
    /// Bytes currently held by owner handles.
    pub owned_bytes: usize,
    pub cycles: u64,
    /// Handles finalized over the heap's lifetime.
    pub finalized: u64,
    pub freed_bytes: u64,
}

/// Outcome of one or more collection cycles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectReport {
    pub cycles: usize,
    /// Handles that survived the last cycle.
    pub marked: usize,
    pub finalized: usize,
    pub freed_bytes: usize,
    /// Registry keys whose last use was released.
    pub released_keys: usize,
}

impl std::ops::AddAssign for CollectReport {
    fn add_assign(&mut self, rhs: CollectReport) {
        self.cycles += rhs.cycles;
        self.marked = rhs.marked;
        self.finalized += rhs.finalized;
        self.freed_bytes += rhs.freed_bytes;
        self.released_keys += rhs.released_keys;
    }
}

#[derive(Debug)]
pub struct Heap {
    types: TypeTable,
    /// One ownership registry per registered element type, by type index.
    registries: Vec<OwnershipRegistry>,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    options: GcOptions,
    /// Owned bytes allocated since the last cycle.
    debt: usize,
    live_handles: usize,
    owned_bytes: usize,
    cycles: u64,
    finalized: u64,
    freed_bytes: u64,
}

impl Heap {
    pub fn builder() -> HeapBuilder {
        HeapBuilder::new()
    }

    pub(crate) fn new(types: TypeTable, options: GcOptions) -> Heap {
        let registries = types.iter().map(|_| OwnershipRegistry::new()).collect();
        Heap {
            types,
            registries,
            slots: Vec::new(),
            free_slots: Vec::new(),
            options,
            debt: 0,
            live_handles: 0,
            owned_bytes: 0,
            cycles: 0,
            finalized: 0,
            freed_bytes: 0,
        }
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn options(&self) -> &GcOptions {
        &self.options
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_handles: self.live_handles,
            owned_bytes: self.owned_bytes,
            cycles: self.cycles,
            finalized: self.finalized,
            freed_bytes: self.freed_bytes,
        }
    }

    /// Registry counters summed over all element types.
    pub fn registry_stats(&self) -> RegistryStats {
        self.registries
            .iter()
            .map(OwnershipRegistry::stats)
            .fold(RegistryStats::default(), |acc, s| acc + s)
    }

    /// The ownership registry of element type `T`.
    pub fn registry<T: Element>(&self) -> Result<&OwnershipRegistry> {
        let index = self.types.require::<T>()?;
        Ok(&self.registries[index.as_usize()])
    }

    /// Returns `true` while the handle has not been finalized.
    pub fn is_live(&self, id: impl Into<HandleId>) -> bool {
        self.cell(id.into()).is_ok()
    }

    /// The registered element type of a live handle.
    pub fn element_type(&self, id: impl Into<HandleId>) -> Result<&ElementType> {
        let cell = self.cell(id.into())?;
        self.types
            .get(cell.type_index)
            .ok_or_else(|| Error::invalid_operation("handle refers to an unknown element type"))
    }

    /// Recovers a typed handle, failing with a `TypeError` if the handle's
    /// element type is not `T`.
    pub fn downcast<T: Element>(&self, id: HandleId) -> Result<Handle<T>> {
        let handle = Handle::new(id);
        self.typed_cell(handle)?;
        Ok(handle)
    }

    pub fn descriptor<T: Element>(&self, handle: Handle<T>) -> Result<&BufferDescriptor> {
        Ok(&self.typed_cell(handle)?.descriptor)
    }

    pub fn tag<T: Element>(&self, handle: Handle<T>) -> Result<Tag> {
        Ok(self.descriptor(handle)?.tag())
    }

    /// Number of elements, `|count|`.
    pub fn len<T: Element>(&self, handle: Handle<T>) -> Result<usize> {
        Ok(self.descriptor(handle)?.len())
    }

    /// The signed count encoding of the handle's descriptor.
    pub fn count<T: Element>(&self, handle: Handle<T>) -> Result<isize> {
        Ok(self.descriptor(handle)?.count())
    }

    /// Adds a host root to the handle.
    pub fn root(&mut self, id: impl Into<HandleId>) -> Result<()> {
        let cell = self.cell_mut(id.into())?;
        cell.roots = cell
            .roots
            .checked_add(1)
            .ok_or_else(|| Error::invalid_operation("root count overflow"))?;
        Ok(())
    }

    /// Drops one host root. A handle with no roots left is collectible unless
    /// the registry holds it.
    pub fn unroot(&mut self, id: impl Into<HandleId>) -> Result<()> {
        let id = id.into();
        let cell = self.cell_mut(id)?;
        if cell.roots == 0 {
            return Err(Error::invalid_operation(format!("unroot of unrooted handle {id}")));
        }
        cell.roots -= 1;
        Ok(())
    }

    pub fn root_count(&self, id: impl Into<HandleId>) -> Result<u32> {
        Ok(self.cell(id.into())?.roots)
    }

    /// Borrows the elements of an owner or view.
    ///
    /// Fails with a `TypeError` for external pointers, whose extent is unknown.
    pub fn elements<T: Element>(&self, handle: Handle<T>) -> Result<&[T]> {
        self.array(handle, "elements")
    }

    /// Mutably borrows the elements of an owner or view.
    pub fn elements_mut<T: Element>(&mut self, handle: Handle<T>) -> Result<&mut [T]> {
        self.array_mut(handle, "elements_mut")
    }

    /// Copies the elements into a `Vec`.
    pub fn to_vec<T: Element>(&self, handle: Handle<T>) -> Result<Vec<T>> {
        Ok(self.elements(handle)?.to_vec())
    }

    /// Runs one mark-and-sweep cycle.
    ///
    /// The root set is every handle with a host root plus every owner held by
    /// an ownership registry. Unreachable handles are finalized. An owner whose
    /// last view is finalized in this cycle stays alive until the next one.
    pub fn collect(&mut self) -> CollectReport {
        for slot in &mut self.slots {
            if let Some(cell) = slot.cell.as_mut() {
                cell.marked = cell.roots != 0;
            }
        }
        for registry in &self.registries {
            for owner in registry.owners() {
                if let Some(cell) = self
                    .slots
                    .get_mut(owner.index as usize)
                    .filter(|s| s.generation == owner.generation)
                    .and_then(|s| s.cell.as_mut())
                {
                    cell.marked = true;
                }
            }
        }

        let mut report = CollectReport {
            cycles: 1,
            ..Default::default()
        };
        for index in 0..self.slots.len() {
            match &self.slots[index].cell {
                Some(cell) if cell.marked => {
                    report.marked += 1;
                    continue;
                }
                Some(_) => {}
                None => continue,
            }
            let Some((id, cell)) = self.vacate(index) else {
                continue;
            };
            report.finalized += 1;
            match self.finalize_cell(id, cell) {
                Finalized::Freed { bytes } => report.freed_bytes += bytes,
                Finalized::Released { last_use: true, .. } => report.released_keys += 1,
                Finalized::Released { .. } | Finalized::Ignored => {}
            }
        }

        self.debt = 0;
        self.cycles += 1;
        self.finalized += report.finalized as u64;
        self.freed_bytes += report.freed_bytes as u64;
        log::debug!(
            "gc cycle {}: {} live, {} finalized, {} bytes freed, {} registry keys released",
            self.cycles,
            report.marked,
            report.finalized,
            report.freed_bytes,
            report.released_keys
        );
        report
    }

    /// Repeats collection cycles until one finalizes nothing.
    pub fn collect_full(&mut self) -> CollectReport {
        let mut total = CollectReport::default();
        loop {
            let report = self.collect();
            total += report;
            if report.finalized == 0 {
                return total;
            }
        }
    }
}

impl Heap {
    /// Stores a new handle, rooted once on behalf of the caller.
    pub(crate) fn insert<T: Element>(&mut self, descriptor: BufferDescriptor) -> Result<Handle<T>> {
        let type_index = self.types.require::<T>()?;
        let owned = match descriptor.ownership() {
            Ownership::Owner(block) => block.len(),
            _ => 0,
        };
        let cell = HandleCell {
            descriptor,
            type_index,
            roots: 1,
            marked: false,
        };

        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| Error::invalid_operation("handle table is full"))?;
                self.slots.push(Slot::default());
                index
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.cell = Some(cell);
        let id = HandleId::from_parts(index, slot.generation);

        self.live_handles += 1;
        self.owned_bytes += owned;
        self.debt += owned;
        Ok(Handle::new(id))
    }

    /// Finalizes a handle right away instead of leaving it to the collector.
    ///
    /// Only for handles that were never handed out, such as views built by an
    /// operation that fails before returning them.
    pub(crate) fn discard(&mut self, id: HandleId) -> Result<Finalized> {
        self.cell(id)?;
        let (id, cell) = self
            .vacate(id.index as usize)
            .ok_or_else(|| Error::stale_handle(id.index, id.generation))?;
        self.finalized += 1;
        Ok(self.finalize_cell(id, cell))
    }

    /// Takes the cell out of slot `index` and makes the slot reusable under
    /// the next generation. A slot whose generation cannot advance is retired
    /// for good, so an id is never matched by two different handles.
    fn vacate(&mut self, index: usize) -> Option<(HandleId, HandleCell)> {
        let slot = self.slots.get_mut(index)?;
        let cell = slot.cell.take()?;
        let id = HandleId::from_parts(index as u32, slot.generation);
        match slot.generation.checked_add(1) {
            Some(next) => {
                slot.generation = next;
                self.free_slots.push(index as u32);
            }
            None => log::debug!("handle slot {index} exhausted its generations, retiring it"),
        }
        self.live_handles -= 1;
        Some((id, cell))
    }

    fn finalize_cell(&mut self, id: HandleId, cell: HandleCell) -> Finalized {
        let registry = &mut self.registries[cell.type_index.as_usize()];
        let outcome = lifecycle::finalize(id, cell.descriptor, registry);
        if let Finalized::Freed { bytes } = outcome {
            self.owned_bytes -= bytes;
        }
        outcome
    }

    /// Runs a collection cycle if enough owned memory was allocated since the
    /// last one. Only called once an operation no longer touches its operands.
    pub(crate) fn maybe_collect(&mut self) {
        if let Some(step) = self.options.step_bytes {
            if self.debt >= step {
                self.collect();
            }
        }
    }

    pub(crate) fn cell(&self, id: HandleId) -> Result<&HandleCell> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.cell.as_ref())
            .ok_or_else(|| Error::stale_handle(id.index, id.generation))
    }

    pub(crate) fn cell_mut(&mut self, id: HandleId) -> Result<&mut HandleCell> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.cell.as_mut())
            .ok_or_else(|| Error::stale_handle(id.index, id.generation))
    }

    pub(crate) fn typed_cell<T: Element>(&self, handle: Handle<T>) -> Result<&HandleCell> {
        let expected = self.types.require::<T>()?;
        let cell = self.cell(handle.id)?;
        if cell.type_index != expected {
            let actual = self
                .types
                .get(cell.type_index)
                .map_or("unknown", ElementType::name);
            return Err(Error::type_error(
                T::KIND.to_string(),
                format!("handle {} holds {actual} elements", handle.id),
            ));
        }
        Ok(cell)
    }

    pub(crate) fn registry_mut(&mut self, index: TypeIndex) -> &mut OwnershipRegistry {
        &mut self.registries[index.as_usize()]
    }

    /// Base pointer and length of an owner or view; `TypeError` naming `op`
    /// for external pointers.
    pub(crate) fn array_parts<T: Element>(
        &self,
        handle: Handle<T>,
        op: &str,
    ) -> Result<(NonNull<T>, usize)> {
        let descriptor = &self.typed_cell(handle)?.descriptor;
        if descriptor.tag() == Tag::External {
            return Err(Error::type_error(
                op,
                "not supported on an external pointer with unknown extent",
            ));
        }
        Ok((descriptor.base().cast::<T>(), descriptor.len()))
    }

    pub(crate) fn array<T: Element>(&self, handle: Handle<T>, op: &str) -> Result<&[T]> {
        let (base, len) = self.array_parts(handle, op)?;
        // SAFETY: the handle is live, so its memory is either held by its own
        // block or by an owner the registry keeps reachable; `len` elements of
        // `T` fit in it and the base is aligned for `T`.
        Ok(unsafe { std::slice::from_raw_parts(base.as_ptr(), len) })
    }

    pub(crate) fn array_mut<T: Element>(&mut self, handle: Handle<T>, op: &str) -> Result<&mut [T]> {
        let (base, len) = self.array_parts(handle, op)?;
        // SAFETY: as in `array`; `&mut self` rules out any other borrow of heap
        // memory for the lifetime of the slice.
        Ok(unsafe { std::slice::from_raw_parts_mut(base.as_ptr(), len) })
    }

    /// Allocates zeroed memory for `count` elements of `T` without creating a
    /// handle yet.
    pub(crate) fn alloc_block<T: Element>(&self, count: usize) -> Result<NativeBlock> {
        self.types.require::<T>()?;
        let bytes = Some(count)
            .filter(|&c| c <= MAX_ELEMENT_COUNT)
            .and_then(|c| c.checked_mul(std::mem::size_of::<T>()))
            .filter(|&b| b <= isize::MAX as usize)
            .ok_or_else(|| {
                Error::range(
                    "count",
                    format!("{count} elements of {} exceed the addressable size", T::KIND),
                )
            })?;
        let alignment = std::mem::align_of::<T>().max(NativeBlock::PREFERRED_ALIGNMENT);
        NativeBlock::try_zeroed(bytes, alignment).map_err(|e| {
            log::warn!("allocation of {count} {} elements failed: {e}", T::KIND);
            Error::allocation(e.requested_bytes().max(bytes))
        })
    }

    /// Turns a block from [`Heap::alloc_block`] into an owner handle.
    pub(crate) fn insert_owner<T: Element>(
        &mut self,
        block: NativeBlock,
        count: usize,
    ) -> Result<Handle<T>> {
        debug_assert!(block.len() >= count * std::mem::size_of::<T>());
        let descriptor = BufferDescriptor::make_owner(block, count)?;
        self.insert(descriptor)
    }

    /// Exchanges the descriptors of two cells.
    pub(crate) fn swap_descriptors(&mut self, a: HandleId, b: HandleId) -> Result<()> {
        self.cell(a)?;
        self.cell(b)?;
        if a == b {
            return Ok(());
        }
        let (low, high) = if a.index < b.index { (a, b) } else { (b, a) };
        let (head, tail) = self.slots.split_at_mut(high.index as usize);
        let low_cell = head[low.index as usize]
            .cell
            .as_mut()
            .ok_or_else(|| Error::stale_handle(low.index, low.generation))?;
        let high_cell = tail[0]
            .cell
            .as_mut()
            .ok_or_else(|| Error::stale_handle(high.index, high.generation))?;
        std::mem::swap(&mut low_cell.descriptor, &mut high_cell.descriptor);
        Ok(())
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let mut finalized = 0usize;
        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            let Some(cell) = slot.cell.take() else {
                continue;
            };
            let id = HandleId::from_parts(index as u32, slot.generation);
            let registry = &mut self.registries[cell.type_index.as_usize()];
            lifecycle::finalize(id, cell.descriptor, registry);
            finalized += 1;
        }
        log::debug!("heap shutdown: finalized {finalized} remaining handles");
    }
}
