// crates/spacetime-post-core/src/proof.rs

//! The `Proof` data type: everything needed to demonstrate that a specific
//! leaf of a specific plot produced a specific challenge score, plus a
//! Merkle inclusion path back to the plot's committed root.

use serde::{Deserialize, Serialize};

/// A Merkle inclusion proof bundled with the score it won a challenge with.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proof {
    /// The winning leaf's raw 32-byte value.
    pub leaf_value: [u8; 32],
    /// The winning leaf's index (nonce) within the plot.
    pub leaf_index: u64,
    /// Sibling hashes along the path from leaf to root, bottom-up.
    pub sibling_hashes: Vec<[u8; 32]>,
    /// `true` at level `i` means the sibling at that level sits to the
    /// right of the path node (the path node is the left child).
    pub orientation_bits: Vec<bool>,
    /// The plot's committed Merkle root.
    pub merkle_root: [u8; 32],
    /// The challenge this proof answers.
    pub challenge: [u8; 32],
    /// `SHA256(challenge ‖ leaf_value)`, interpreted as a big-endian
    /// 256-bit integer; lower is better.
    pub score: [u8; 32],
}

impl Proof {
    /// Structural self-check: sibling and orientation lengths agree.
    ///
    /// This does not verify cryptographic soundness (see
    /// `spacetime_post_merkle::verify_path` / `spacetime_post_proof::validator`
    /// for that) — only that the two parallel vectors agree in length.
    #[must_use]
    pub fn shape_is_consistent(&self) -> bool {
        self.sibling_hashes.len() == self.orientation_bits.len()
    }

    /// Tree height implied by this proof's path length.
    #[must_use]
    pub fn height(&self) -> usize {
        self.sibling_hashes.len()
    }
}
