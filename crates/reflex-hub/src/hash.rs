//! Deterministic Hashing for Fingerprints
//!
//! This module provides a seed-based [`Hasher`] used to fingerprint an
//! engine. All mixing goes through [`crate::hash_seed`].
//!
//! # Determinism
//!
//! Unlike `std::collections::hash_map::DefaultHasher` which uses random keys,
//! [`SeededHasher`] produces the same output for the same inputs across runs,
//! so two engines in the same state always share a fingerprint.
//!
//! # Example
//!
//! ```
//! use reflex_hub::hash::hash_with_seed;
//! use reflex_hub::DEFAULT_FINGERPRINT_SEED;
//! use reflex_core::Reference;
//!
//! let door = Reference::new("house.door");
//! let h1 = hash_with_seed(&door, DEFAULT_FINGERPRINT_SEED);
//! let h2 = hash_with_seed(&door, DEFAULT_FINGERPRINT_SEED);
//! assert_eq!(h1, h2);
//! assert_ne!(h1, hash_with_seed(&door, DEFAULT_FINGERPRINT_SEED + 1));
//! ```

use crate::config::hash_seed;
use std::hash::{Hash, Hasher};

const FNV_PRIME: u64 = 0x100000001b3;

/// A [`Hasher`] with a fixed seed
///
/// FNV-1a with the seed as the initial state, mixed with [`hash_seed`]
/// every eight bytes and once more on `finish`.
#[derive(Debug, Clone)]
pub struct SeededHasher {
    seed: u64,
    state: u64,
    written: u64,
}

impl SeededHasher {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            state: seed,
            written: 0,
        }
    }
}

impl Hasher for SeededHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= b as u64;
            self.state = self.state.wrapping_mul(FNV_PRIME);
            self.written += 1;
            if self.written % 8 == 0 {
                self.state = hash_seed(self.seed, self.state, self.written);
            }
        }
    }

    fn finish(&self) -> u64 {
        hash_seed(self.seed, self.state, self.written)
    }
}

/// Hash anything with a deterministic [`Hash`] impl
pub fn hash_with_seed<T: Hash + ?Sized>(value: &T, seed: u64) -> u64 {
    let mut hasher = SeededHasher::new(seed);
    value.hash(&mut hasher);
    hasher.finish()
}
