//! Key hashing and balance-priority derivation.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Hash a key down to the 32-bit digest used for tree placement.
pub(crate) fn hash_value(k: &impl Hash) -> u32 {
    let mut hasher = FxHasher::default();
    k.hash(&mut hasher);
    hasher.finish() as u32
}

/// Avalanche-mix a hash into a balance priority.
///
/// The mix is bijective, so two keys get the same priority only when their
/// hashes already collide.
pub(crate) fn mix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_is_injective_on_small_range() {
        let mut seen = std::collections::HashSet::new();
        for h in 0..1u32 << 16 {
            assert!(seen.insert(mix(h)));
        }
    }

    #[test]
    fn hash_value_is_stable() {
        assert_eq!(hash_value(&42u64), hash_value(&42u64));
        assert_eq!(hash_value(&"key"), hash_value(&"key"));
    }
}
