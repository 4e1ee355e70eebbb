//! Core definitions shared by all tether-* crates: the error taxonomy and the
//! argument verification helpers.

pub mod error;
pub mod result;

pub use result::Result;
