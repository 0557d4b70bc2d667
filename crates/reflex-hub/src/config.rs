//! Engine Configuration - seeds and history bound
//!
//! This module provides configuration for the [`Engine`](crate::Engine):
//! the seed of the conflict-resolution RNG, the bound on undo history and
//! the seed used for deterministic fingerprints.

use serde::{Deserialize, Serialize};

/// Default seed for the conflict-resolution RNG
pub const DEFAULT_SEED: u64 = 12345;

/// Default seed for engine fingerprints
pub const DEFAULT_FINGERPRINT_SEED: u64 = 0x5EED_F00D_CAFE_BABE;

/// Configuration for an engine
///
/// # Example
///
/// ```
/// use reflex_hub::EngineConfig;
///
/// let config = EngineConfig::default().with_seed(7).with_max_history(16);
/// assert_eq!(config.seed, 7);
/// assert!(config.is_history_bounded());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for the conflict-resolution RNG
    pub seed: u64,

    /// Maximum number of ticks kept for undo
    ///
    /// - `0`: unbounded (default)
    /// - `> 0`: the oldest entry is evicted once the bound is reached
    pub max_history: usize,

    /// Seed for [`Engine::fingerprint`](crate::Engine::fingerprint)
    pub fingerprint_seed: u64,
}

impl EngineConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_fingerprint_seed(mut self, seed: u64) -> Self {
        self.fingerprint_seed = seed;
        self
    }

    /// Check if history has a bound
    pub fn is_history_bounded(&self) -> bool {
        self.max_history > 0
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            max_history: 0,
            fingerprint_seed: DEFAULT_FINGERPRINT_SEED,
        }
    }
}

/// Mix a seed with two slot values into a well-distributed u64
///
/// Each slot is folded in with a distinct odd multiplier and the result is
/// finished with the splitmix64 avalanche, so neighbouring inputs land far
/// apart.
///
/// # Example
///
/// ```
/// use reflex_hub::hash_seed;
///
/// assert_eq!(hash_seed(1, 2, 3), hash_seed(1, 2, 3));
/// assert_ne!(hash_seed(1, 2, 3), hash_seed(1, 3, 2));
/// ```
pub fn hash_seed(seed: u64, a: u64, b: u64) -> u64 {
    let mut z = seed
        ^ a.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ b.wrapping_mul(0xC2B2_AE3D_27D4_EB4F).rotate_left(31);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.max_history, 0);
        assert!(!config.is_history_bounded());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_seed(99)
            .with_max_history(4)
            .with_fingerprint_seed(1);
        assert_eq!(config.seed, 99);
        assert_eq!(config.max_history, 4);
        assert_eq!(config.fingerprint_seed, 1);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: EngineConfig = ron::from_str("(seed: 3)").unwrap();
        assert_eq!(config.seed, 3);
        assert_eq!(config.fingerprint_seed, DEFAULT_FINGERPRINT_SEED);
    }

    #[test]
    fn test_hash_seed_spreads_slots() {
        let a = hash_seed(0, 0, 0);
        let b = hash_seed(0, 1, 0);
        let c = hash_seed(0, 0, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }
}
