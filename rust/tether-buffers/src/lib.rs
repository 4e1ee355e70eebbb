//! Garbage-collected native buffers with owner, view and external handles.
//!
//! This crate is the ownership core of a native-memory extension for a host
//! runtime with a tracing collector. The host sees buffers only as handles;
//! native code sees plain addresses and element counts.
//!
//! # Core Concepts
//!
//! ## Handles and descriptors
//!
//! Every handle wraps one [`BufferDescriptor`]: a base address, an element
//! count and exactly one ownership [`Tag`]:
//! - **Owner**: the handle allocated the memory and frees it when finalized.
//! - **View**: the handle aliases a sub-range of an owner's memory and never
//!   frees it.
//! - **External**: the handle wraps a foreign address with unknown extent.
//!
//! ## The heap
//!
//! [`Heap`] holds the handle table and stands in for the host's collector:
//! host roots are explicit ([`Heap::root`], [`Heap::unroot`]) and
//! [`Heap::collect`] finalizes every handle that is neither rooted nor held by
//! an ownership registry.
//!
//! ## Ownership registries
//!
//! A view keeps its owner alive through an [`OwnershipRegistry`] entry. Each
//! view adds one use to the entry of its root owner when it is constructed and
//! gives it back when it is finalized, so an owner outlives every view of it
//! and is reclaimed once the last one is gone.
//!
//! # Example
//!
//! ```
//! use tether_buffers::Heap;
//!
//! let mut heap = Heap::builder().with_standard_types().build().unwrap();
//! let owner = heap.from_slice(&[1u32, 2, 3, 4, 5, 6]).unwrap();
//! let halves = heap.partition_into(owner, 2).unwrap();
//! heap.unroot(owner).unwrap();
//! heap.collect_full();
//!
//! // The owner is kept alive by its views.
//! assert_eq!(heap.to_vec(halves[1]).unwrap(), vec![4, 5, 6]);
//! ```

pub mod descriptor;
pub mod element;
pub mod heap;
mod interface;
mod lifecycle;
pub mod ops;
pub mod registry;
pub mod types;
mod view;

pub use descriptor::{BufferDescriptor, MAX_ELEMENT_COUNT, Ownership, Tag};
pub use element::{Element, ElementKind, Record};
pub use heap::{CollectReport, Handle, HandleId, Heap, HeapStats};
pub use lifecycle::Finalized;
pub use ops::Direction;
pub use registry::{OwnershipRegistry, RegistryKey, RegistryStats};
pub use types::{DEFAULT_GC_STEP_BYTES, ElementType, GcOptions, HeapBuilder, TypeIndex, TypeTable};
