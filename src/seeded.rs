//! Deterministic string hashing and seeded shuffling.
//!
//! The FNV-1a / LCG / Fisher-Yates chain is part of the output contract:
//! build ids, segmentation version stamps, assignment tie-breaks, and
//! compare-pair order are all reproducible across runs and machines because
//! nothing here touches a platform entropy source. Changing any constant
//! changes every downstream artifact.

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;

pub fn fnv1a(input: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Eight lowercase hex digits of the FNV-1a hash.
pub fn stable_hash(input: &str) -> String {
    format!("{:08x}", fnv1a(input))
}

/// Fisher-Yates shuffle driven by an LCG seeded from the string hash.
/// Pure function of `(items, seed)`.
pub fn seeded_shuffle<T: Clone>(items: &[T], seed: &str) -> Vec<T> {
    let mut result = items.to_vec();
    let mut state = fnv1a(seed);

    for i in (1..result.len()).rev() {
        state = state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT);
        let j = (state as usize) % (i + 1);
        result.swap(i, j);
    }

    result
}
