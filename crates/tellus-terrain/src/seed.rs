//! Deterministic seed derivation and math utilities.
//!
//! Per-patch seeds are derived by hashing the parent seed with the child slot,
//! so the same formation seed always reproduces the same tree of patch seeds
//! regardless of subdivision order. Transcendental functions route through
//! `libm` for cross-platform bit-exact crater placement.

use std::hash::{DefaultHasher, Hash, Hasher};

/// Derive a child patch seed from its parent seed and child slot (0..4).
///
/// Uses SipHash (via std's `DefaultHasher`) to combine the inputs into a
/// well-distributed u64. The derivation is pure, so either side of an edge
/// can reproduce it.
#[must_use]
pub fn derive_seed(parent_seed: u64, child_slot: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent_seed.hash(&mut hasher);
    child_slot.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic sine using libm (not platform libc).
#[inline]
#[must_use]
pub fn det_sin(x: f64) -> f64 {
    libm::sin(x)
}

/// Deterministic cosine using libm.
#[inline]
#[must_use]
pub fn det_cos(x: f64) -> f64 {
    libm::cos(x)
}

/// Deterministic arccosine using libm.
#[inline]
#[must_use]
pub fn det_acos(x: f64) -> f64 {
    libm::acos(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_seed_deterministic() {
        assert_eq!(derive_seed(42, 3), derive_seed(42, 3));
    }

    #[test]
    fn test_derive_seed_varies_with_slot() {
        let seeds: Vec<u64> = (0..4).map(|slot| derive_seed(99, slot)).collect();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert_ne!(seeds[i], seeds[j], "slots {i} and {j} collided");
            }
        }
    }

    #[test]
    fn test_derive_seed_varies_with_parent() {
        assert_ne!(derive_seed(0, 0), derive_seed(1, 0));
    }

    #[test]
    fn test_det_math_deterministic() {
        let x = 0.987_654_321;
        assert_eq!(det_sin(x), det_sin(x));
        assert_eq!(det_cos(x), det_cos(x));
        assert_eq!(det_acos(x), det_acos(x));
    }
}
