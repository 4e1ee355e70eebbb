//! Native memory for the tether infrastructure: aligned fixed-size allocations
//! handed out to owner handles, alignment arithmetic, and address-range helpers
//! used to reason about aliasing between handles.

pub mod align;
pub mod block;
pub mod region;

pub use block::{AllocError, NativeBlock};
pub use region::AddressRange;
