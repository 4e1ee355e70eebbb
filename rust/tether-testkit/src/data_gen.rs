//! Data generation utilities for testing.
//!
//! This module provides seeded generators for element sequences, index
//! arguments and text.

use std::ops::Range;

use rand::distr::{Distribution, StandardUniform};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Returns a deterministic generator for `seed`.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Generates `len` values drawn uniformly over the whole domain of `T`.
///
/// For floating-point types the values fall in `[0, 1)`.
pub fn random_values<T>(seed: u64, len: usize) -> Vec<T>
where
    StandardUniform: Distribution<T>,
{
    let mut rng = seeded_rng(seed);
    (0..len).map(|_| rng.random()).collect()
}

/// Generates `len` integers in `range`. Small ranges produce many duplicates,
/// which is what search tests over sorted data need.
pub fn random_in_range(seed: u64, len: usize, range: Range<i64>) -> Vec<i64> {
    assert!(!range.is_empty());
    let mut rng = seeded_rng(seed);
    (0..len).map(|_| rng.random_range(range.clone())).collect()
}

/// Returns a random permutation of `0..n`.
pub fn shuffled_indices(seed: u64, n: usize) -> Vec<u64> {
    let mut values: Vec<u64> = (0..n as u64).collect();
    values.shuffle(&mut seeded_rng(seed));
    values
}

/// Generates `count` (length, shift) pairs with lengths in `1..=max_len` and
/// shifts in `0..=3 * length`, so that shifts both below and above the length
/// are covered.
pub fn rotation_cases(seed: u64, count: usize, max_len: usize) -> Vec<(usize, usize)> {
    assert_ne!(max_len, 0);
    let mut rng = seeded_rng(seed);
    (0..count)
        .map(|_| {
            let len = rng.random_range(1..=max_len);
            let shift = rng.random_range(0..=3 * len);
            (len, shift)
        })
        .collect()
}

/// Generates a string of `chars` characters mixing ASCII, two-byte and
/// three-byte BMP characters, and characters outside the BMP.
pub fn random_text(seed: u64, chars: usize) -> String {
    const POOL: &[char] = &[
        'a', 'z', 'Q', '0', ' ', '~', 'é', 'ß', 'Ж', 'λ', '中', '文', '€', '\u{ffef}', '🦀',
        '😀', '\u{10348}', '\u{1f600}',
    ];
    let mut rng = seeded_rng(seed);
    (0..chars)
        .map(|_| POOL[rng.random_range(0..POOL.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generators_are_deterministic() {
        assert_eq!(random_values::<u32>(7, 16), random_values::<u32>(7, 16));
        assert_ne!(random_values::<u32>(7, 16), random_values::<u32>(8, 16));
        assert_eq!(random_text(3, 10), random_text(3, 10));
    }

    #[test]
    fn test_shuffled_indices_is_permutation() {
        let mut values = shuffled_indices(11, 100);
        values.sort_unstable();
        assert_eq!(values, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_ranges() {
        assert!(random_in_range(1, 200, -3..4).iter().all(|v| (-3..4).contains(v)));
        for (len, shift) in rotation_cases(5, 50, 9) {
            assert!((1..=9).contains(&len));
            assert!(shift <= 3 * len);
        }
        assert_eq!(random_text(2, 12).chars().count(), 12);
    }
}
