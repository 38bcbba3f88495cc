// crates/spacetime-post-proof/src/scoring.rs

//! Challenge scoring: `score = SHA256(challenge ‖ leaf)`, compared as
//! unsigned big-endian 256-bit integers (lower wins).
//! `[u8; 32]`'s derived `Ord` already compares lexicographically byte by
//! byte, which is exactly big-endian unsigned comparison, so ordinary `<`
//! is the scoring rule — no custom comparator is needed.

use sha2::{Digest, Sha256};

/// `SHA256(challenge ‖ leaf)`.
#[must_use]
pub fn compute_score(challenge: &[u8; 32], leaf: &[u8; 32]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(challenge);
    h.update(leaf);
    h.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_score_wins_by_natural_array_order() {
        let low = [0u8; 32];
        let mut high = [0u8; 32];
        high[31] = 1;
        assert!(low < high);
    }

    #[test]
    fn deterministic() {
        let c = [1u8; 32];
        let l = [2u8; 32];
        assert_eq!(compute_score(&c, &l), compute_score(&c, &l));
    }
}
