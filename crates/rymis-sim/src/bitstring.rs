//! Occupation configurations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A fixed-length occupation pattern; bit `k` set means vertex `k` is
/// excited.
///
/// Equality and hashing cover both the pattern and the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bitstring {
    bits: u64,
    len: usize,
}

impl Bitstring {
    /// Wrap a packed pattern of `len` sites. Bits at or above `len` are
    /// cleared.
    pub fn new(bits: u64, len: usize) -> Self {
        debug_assert!(len <= 64);
        let mask = if len >= 64 { u64::MAX } else { (1u64 << len) - 1 };
        Self {
            bits: bits & mask,
            len,
        }
    }

    /// The all-zero configuration.
    pub fn zeros(len: usize) -> Self {
        Self::new(0, len)
    }

    /// Build from the list of excited sites.
    pub fn from_sites(len: usize, sites: impl IntoIterator<Item = usize>) -> Self {
        let bits = sites
            .into_iter()
            .filter(|&k| k < len)
            .fold(0u64, |acc, k| acc | (1 << k));
        Self::new(bits, len)
    }

    /// Packed pattern.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when there are no sites at all.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of excited sites.
    pub fn occupied_count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Whether site `k` is excited.
    pub fn is_set(&self, k: usize) -> bool {
        k < self.len && (self.bits >> k) & 1 == 1
    }

    /// Copy with site `k` toggled.
    #[must_use]
    pub fn flipped(&self, k: usize) -> Self {
        Self::new(self.bits ^ (1 << k), self.len)
    }

    /// Copy with site `k` cleared.
    #[must_use]
    pub fn cleared(&self, k: usize) -> Self {
        Self::new(self.bits & !(1 << k), self.len)
    }

    /// Copy with site `k` set.
    #[must_use]
    pub fn with_set(&self, k: usize) -> Self {
        Self::new(self.bits | (1 << k), self.len)
    }

    /// Excited sites in ascending order.
    pub fn occupied_sites(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&k| self.is_set(k))
    }

    /// True if every site excited here is excited in `other`.
    pub fn is_subset_of(&self, other: &Bitstring) -> bool {
        self.bits & !other.bits == 0
    }
}

/// Site 0 is printed first.
impl fmt::Display for Bitstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for k in 0..self.len {
            f.write_str(if self.is_set(k) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_puts_site_zero_first() {
        let b = Bitstring::from_sites(4, [0, 2]);
        assert_eq!(b.to_string(), "1010");
        assert_eq!(b.bits(), 0b0101);
    }

    #[test]
    fn high_bits_are_masked() {
        let b = Bitstring::new(0b1_0001, 4);
        assert_eq!(b.bits(), 0b0001);
        assert_eq!(b.occupied_count(), 1);
    }

    #[test]
    fn flip_and_subset() {
        let b = Bitstring::from_sites(5, [1, 3]);
        let c = b.flipped(3);
        assert!(c.is_subset_of(&b));
        assert!(!b.is_subset_of(&c));
        assert_eq!(c.occupied_sites().collect::<Vec<_>>(), vec![1]);
        assert_eq!(c.with_set(4).cleared(1), Bitstring::from_sites(5, [4]));
    }

    #[test]
    fn full_width() {
        let b = Bitstring::new(u64::MAX, 64);
        assert_eq!(b.occupied_count(), 64);
        assert!(b.is_set(63));
    }
}
