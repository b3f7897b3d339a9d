//! Stable seed derivation for named random streams.
//!
//! `std`'s `DefaultHasher` is randomised per process, so track and biome
//! names are folded with 64-bit FNV-1a instead.

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a digest of `bytes`.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |state, &byte| {
        (state ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Mix a layout seed with a label so each named stream is independent.
pub fn seed_for_label(seed: u64, label: &str) -> u64 {
    seed ^ fnv1a(label.as_bytes()).rotate_left(17)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_reference_vectors() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn labels_produce_distinct_stable_seeds() {
        let a = seed_for_label(42, "obstacles");
        let b = seed_for_label(42, "animals");
        assert_ne!(a, b);
        assert_eq!(a, seed_for_label(42, "obstacles"));
        assert_ne!(a, seed_for_label(43, "obstacles"));
    }
}
