//! Test utilities for the tether crates.
//!
//! Everything here is deterministic: generators take a seed, so a failing
//! randomized test reproduces with the seed it prints.

pub mod data_gen;
