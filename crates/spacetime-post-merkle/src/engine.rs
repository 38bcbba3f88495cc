// crates/spacetime-post-merkle/src/engine.rs

//! Streaming Merkle engine: pairwise SHA-256 over a lazy leaf sequence,
//! bounded to `O(height)` working memory.
//!
//! The tree shape follows an odd-count self-duplication law: whenever a
//! level has an odd number of nodes, the trailing node is combined with a
//! duplicate of itself (never zero-padded). A level-accumulator ("pending")
//! holds at most
//! one hash per level at any time; whenever two hashes land on the same
//! level they are combined immediately and the result bubbles to the next
//! level. At the end of the stream, any leftover pendings are collapsed
//! upward by repeated self-duplication until a single root remains.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised by the streaming Merkle engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// The leaf sequence was empty; a Merkle tree needs at least one leaf.
    #[error("cannot build a Merkle tree over zero leaves")]
    EmptyInput,
    /// `target_index` was not less than the number of leaves supplied.
    #[error("target index {index} out of bounds for {leaf_count} leaves")]
    TargetOutOfBounds {
        /// The offending index.
        index: u64,
        /// Total leaves available.
        leaf_count: u64,
    },
}

/// `parent(a, b) = SHA256(a ‖ b)`.
#[inline]
#[must_use]
pub fn parent(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(a);
    h.update(b);
    h.finalize().into()
}

/// `ceil(log2(n))` for `n >= 1`; 0 for `n == 1`.
#[must_use]
pub fn tree_height(leaf_count: u64) -> u64 {
    if leaf_count <= 1 {
        return 0;
    }
    let mut x = leaf_count - 1;
    let mut bits = 0u64;
    while x > 0 {
        x >>= 1;
        bits += 1;
    }
    bits
}

/// Incremental, bounded-memory accumulator for the Merkle root alone (no
/// proof-path bookkeeping). Used by the Plot Creator, which only needs the
/// root and height from a single pass over the leaves it is also writing
/// to disk.
#[derive(Default)]
pub struct StreamingMerkleBuilder {
    /// `pending[level]` holds at most one unpaired hash at that level.
    pending: Vec<Option<[u8; 32]>>,
    count: u64,
}

impl StreamingMerkleBuilder {
    /// Construct an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaves pushed so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Push the next leaf, in strict nonce order.
    pub fn push(&mut self, leaf: [u8; 32]) {
        let mut level = 0usize;
        let mut cur = leaf;
        loop {
            if level == self.pending.len() {
                self.pending.push(None);
            }
            match self.pending[level].take() {
                None => {
                    self.pending[level] = Some(cur);
                    break;
                }
                Some(old) => {
                    cur = parent(&old, &cur);
                    level += 1;
                }
            }
        }
        self.count += 1;
    }

    /// Finalize the tree: collapse any leftover pendings by self-duplication
    /// and return `(root, height)`.
    ///
    /// # Errors
    ///
    /// Returns [`MerkleError::EmptyInput`] if no leaves were ever pushed.
    pub fn finish(mut self) -> Result<([u8; 32], u64), MerkleError> {
        if self.count == 0 {
            return Err(MerkleError::EmptyInput);
        }
        let height = tree_height(self.count) as usize;
        if let Some(idx) = self.pending.len().checked_sub(1) {
            if idx >= height {
                if let Some(root) = self.pending[height] {
                    return Ok((root, height as u64));
                }
            }
        }

        let mut carry: Option<[u8; 32]> = None;
        for level in 0..height {
            let local = self.pending.get(level).copied().flatten();
            carry = match (local, carry) {
                (Some(a), Some(b)) => Some(parent(&a, &b)),
                (Some(a), None) => Some(parent(&a, &a)),
                (None, Some(b)) => Some(parent(&b, &b)),
                (None, None) => None,
            };
        }
        match carry {
            Some(root) => Ok((root, height as u64)),
            None => {
                // height == 0 with count == 1 is handled by the pending[height]
                // fast path above; reaching here would mean an internal
                // bookkeeping bug.
                Err(MerkleError::EmptyInput)
            }
        }
    }
}

/// Full Merkle path for one target leaf: siblings and orientation bits,
/// bottom-up, plus the committed root and tree height.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerklePath {
    /// The root this path was built against.
    pub root: [u8; 32],
    /// `ceil(log2(leaf_count))`.
    pub height: u64,
    /// Sibling hashes, bottom (level 0) to top.
    pub sibling_hashes: Vec<[u8; 32]>,
    /// Orientation bits parallel to `sibling_hashes`; `true` = sibling is to
    /// the right of the path node.
    pub orientation_bits: Vec<bool>,
}

/// Build the Merkle root and, simultaneously, the inclusion path for
/// `target_index`, from a single pass over `leaves`.
///
/// `leaves` must yield exactly `leaf_count` items; `leaf_count` must be
/// known up front so the tree height and orientation bits (which depend on
/// bit parity of `target_index` at each level) can be computed without
/// buffering the whole sequence.
///
/// # Errors
///
/// Returns [`MerkleError::TargetOutOfBounds`] if `target_index >=
/// leaf_count`, or [`MerkleError::EmptyInput`] if `leaf_count == 0`.
pub fn build_with_proof_target<I>(
    leaves: I,
    leaf_count: u64,
    target_index: u64,
) -> Result<MerklePath, MerkleError>
where
    I: IntoIterator<Item = [u8; 32]>,
{
    if leaf_count == 0 {
        return Err(MerkleError::EmptyInput);
    }
    if target_index >= leaf_count {
        return Err(MerkleError::TargetOutOfBounds {
            index: target_index,
            leaf_count,
        });
    }

    let height = tree_height(leaf_count) as usize;
    let mut siblings: Vec<Option<[u8; 32]>> = vec![None; height];

    let mut pending: Vec<Option<[u8; 32]>> = Vec::new();
    // Level at which our tracked ancestor currently sits, parked (not being
    // actively bubbled right now).
    let mut path_level: Option<usize> = None;

    for (i, leaf) in leaves.into_iter().enumerate() {
        let i = i as u64;
        let mut level = 0usize;
        let mut cur = leaf;
        // Is the value currently being bubbled (`cur`) our tracked ancestor?
        let mut carrying = i == target_index;

        loop {
            if level == pending.len() {
                pending.push(None);
            }

            // If not already carrying, check whether the resident at this
            // level is our parked ancestor.
            if !carrying && path_level == Some(level) {
                carrying = true;
                // The resident (old) is the ancestor; sibling will be `cur`.
                // Recorded below once we know a combine actually happens
                // (it must, since path_level == Some(level) implies a
                // resident is present by invariant).
            }

            match pending[level].take() {
                None => {
                    pending[level] = Some(cur);
                    if carrying {
                        path_level = Some(level);
                    }
                    break;
                }
                Some(old) => {
                    if carrying {
                        // Ambiguous only in direction; resolve via bit parity
                        // per spec: bit(level) of target_index decides which
                        // operand is the ancestor.
                        let ancestor_is_old = ((target_index >> level) & 1) == 0;
                        let sibling = if ancestor_is_old { cur } else { old };
                        if level < height {
                            siblings[level] = Some(sibling);
                        }
                    }
                    cur = parent(&old, &cur);
                    level += 1;
                    // `carrying` stays true across the bubble; if it just
                    // became true at this level (resident-was-ancestor
                    // case), path_level no longer reflects a parked state —
                    // clear it so a later, unrelated level isn't mistaken
                    // for still holding the ancestor.
                    if path_level == Some(level - 1) {
                        path_level = None;
                    }
                }
            }
        }
    }

    // Collapse any leftover pendings above whatever level our ancestor
    // reached naturally.
    let mut carry: Option<[u8; 32]> = None;
    let mut carry_is_ancestor = false;
    for level in 0..height {
        let local = pending.get(level).copied().flatten();
        let local_is_ancestor = !carry_is_ancestor && path_level == Some(level);

        let (next_carry, sibling_for_level) = match (local, carry) {
            (Some(a), Some(b)) => {
                let sib = if local_is_ancestor {
                    Some(b)
                } else if carry_is_ancestor {
                    Some(a)
                } else {
                    None
                };
                (Some(parent(&a, &b)), sib)
            }
            (Some(a), None) => {
                let sib = if local_is_ancestor { Some(a) } else { None };
                (Some(parent(&a, &a)), sib)
            }
            (None, Some(b)) => {
                let sib = if carry_is_ancestor { Some(b) } else { None };
                (Some(parent(&b, &b)), sib)
            }
            (None, None) => (None, None),
        };

        if let Some(s) = sibling_for_level {
            siblings[level] = Some(s);
        }
        carry_is_ancestor = local_is_ancestor || carry_is_ancestor;
        carry = next_carry;
    }

    let root = if let Some(r) = pending.get(height).copied().flatten() {
        r
    } else {
        carry.ok_or(MerkleError::EmptyInput)?
    };

    let sibling_hashes: Vec<[u8; 32]> = siblings
        .into_iter()
        .enumerate()
        .map(|(lvl, s)| s.unwrap_or_else(|| panic!("sibling at level {lvl} was never recorded")))
        .collect();
    let orientation_bits: Vec<bool> = (0..height)
        .map(|lvl| ((target_index >> lvl) & 1) == 0)
        .collect();

    Ok(MerklePath {
        root,
        height: height as u64,
        sibling_hashes,
        orientation_bits,
    })
}

/// Verify a Merkle path: walk from `leaf` to the root using `siblings` and
/// `orientations`, and compare against `expected_root`.
///
/// `true` means left-orientation (sibling on the right); `false` means
/// sibling on the left.
#[must_use]
pub fn verify_path(
    leaf: &[u8; 32],
    siblings: &[[u8; 32]],
    orientations: &[bool],
    expected_root: &[u8; 32],
) -> bool {
    if siblings.len() != orientations.len() {
        return false;
    }
    let mut h = *leaf;
    for (sibling, &orient_left) in siblings.iter().zip(orientations) {
        h = if orient_left {
            parent(&h, sibling)
        } else {
            parent(sibling, &h)
        };
    }
    h == *expected_root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_for(i: u64) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(b"test-leaf");
        h.update(i.to_le_bytes());
        h.finalize().into()
    }

    /// Reference implementation: full in-memory level materialization with
    /// the duplicate-last-if-odd rule, used only to cross-check the
    /// streaming engine in tests.
    fn reference_root(leaves: &[[u8; 32]]) -> [u8; 32] {
        assert!(!leaves.is_empty());
        let mut level = leaves.to_vec();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().unwrap());
            }
            let mut next = Vec::with_capacity(level.len() / 2);
            for pair in level.chunks_exact(2) {
                next.push(parent(&pair[0], &pair[1]));
            }
            level = next;
        }
        level[0]
    }

    fn reference_path(leaves: &[[u8; 32]], target: usize) -> (Vec<[u8; 32]>, Vec<bool>) {
        let mut level = leaves.to_vec();
        let mut idx = target;
        let mut siblings = Vec::new();
        let mut orientations = Vec::new();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().unwrap());
            }
            let sib_idx = idx ^ 1;
            siblings.push(level[sib_idx]);
            orientations.push(idx % 2 == 0); // target is left -> sibling right -> true
            let mut next = Vec::with_capacity(level.len() / 2);
            for pair in level.chunks_exact(2) {
                next.push(parent(&pair[0], &pair[1]));
            }
            level = next;
            idx /= 2;
        }
        (siblings, orientations)
    }

    #[test]
    fn single_leaf_root_is_the_leaf_itself() {
        let l = leaf_for(0);
        let mut b = StreamingMerkleBuilder::new();
        b.push(l);
        let (root, height) = b.finish().unwrap();
        assert_eq!(root, l);
        assert_eq!(height, 0);
    }

    #[test]
    fn matches_reference_for_small_counts() {
        for n in 1u64..=40 {
            let leaves: Vec<_> = (0..n).map(leaf_for).collect();
            let mut b = StreamingMerkleBuilder::new();
            for l in &leaves {
                b.push(*l);
            }
            let (root, height) = b.finish().unwrap();
            assert_eq!(root, reference_root(&leaves), "root mismatch at n={n}");
            assert_eq!(height, tree_height(n), "height mismatch at n={n}");
        }
    }

    #[test]
    fn odd_count_uses_self_duplication_not_promotion() {
        // n=3: root must equal parent(parent(a,b), parent(c,c)), NOT
        // parent(parent(a,b), c) (promotion).
        let a = leaf_for(0);
        let b = leaf_for(1);
        let c = leaf_for(2);
        let expected = parent(&parent(&a, &b), &parent(&c, &c));
        let wrong_promotion = parent(&parent(&a, &b), &c);
        assert_ne!(expected, wrong_promotion);

        let mut builder = StreamingMerkleBuilder::new();
        builder.push(a);
        builder.push(b);
        builder.push(c);
        let (root, _) = builder.finish().unwrap();
        assert_eq!(root, expected);
    }

    #[test]
    fn proof_matches_reference_for_every_target_small_counts() {
        for n in 1u64..=33 {
            let leaves: Vec<_> = (0..n).map(leaf_for).collect();
            for target in 0..n {
                let path =
                    build_with_proof_target(leaves.clone(), n, target).unwrap();
                let (ref_sib, ref_orient) = reference_path(&leaves, target as usize);
                assert_eq!(path.sibling_hashes, ref_sib, "siblings mismatch n={n} t={target}");
                assert_eq!(
                    path.orientation_bits, ref_orient,
                    "orientation mismatch n={n} t={target}"
                );
                assert_eq!(path.root, reference_root(&leaves));
                assert!(verify_path(
                    &leaves[target as usize],
                    &path.sibling_hashes,
                    &path.orientation_bits,
                    &path.root
                ));
            }
        }
    }

    #[test]
    fn two_independent_builds_agree() {
        let leaves: Vec<_> = (0..777u64).map(leaf_for).collect();
        let mut b1 = StreamingMerkleBuilder::new();
        let mut b2 = StreamingMerkleBuilder::new();
        for l in &leaves {
            b1.push(*l);
            b2.push(*l);
        }
        assert_eq!(b1.finish().unwrap(), b2.finish().unwrap());
    }

    #[test]
    fn tamper_detection_flips_any_component() {
        let leaves: Vec<_> = (0..10u64).map(leaf_for).collect();
        let path = build_with_proof_target(leaves.clone(), 10, 3).unwrap();
        assert!(verify_path(
            &leaves[3],
            &path.sibling_hashes,
            &path.orientation_bits,
            &path.root
        ));

        let mut bad_sibling = path.sibling_hashes.clone();
        bad_sibling[0][0] ^= 1;
        assert!(!verify_path(&leaves[3], &bad_sibling, &path.orientation_bits, &path.root));

        let mut bad_orient = path.orientation_bits.clone();
        bad_orient[0] = !bad_orient[0];
        assert!(!verify_path(&leaves[3], &path.sibling_hashes, &bad_orient, &path.root));

        let mut bad_leaf = leaves[3];
        bad_leaf[0] ^= 1;
        assert!(!verify_path(&bad_leaf, &path.sibling_hashes, &path.orientation_bits, &path.root));

        let mut bad_root = path.root;
        bad_root[0] ^= 1;
        assert!(!verify_path(&leaves[3], &path.sibling_hashes, &path.orientation_bits, &bad_root));
    }

    #[test]
    fn target_out_of_bounds_is_rejected() {
        let leaves: Vec<_> = (0..4u64).map(leaf_for).collect();
        assert_eq!(
            build_with_proof_target(leaves, 4, 4).unwrap_err(),
            MerkleError::TargetOutOfBounds {
                index: 4,
                leaf_count: 4
            }
        );
    }

    proptest::proptest! {
        #[test]
        fn root_matches_reference_for_random_counts(n in 1u64..300) {
            let leaves: Vec<_> = (0..n).map(leaf_for).collect();
            let mut b = StreamingMerkleBuilder::new();
            for l in &leaves {
                b.push(*l);
            }
            let (root, _) = b.finish().unwrap();
            proptest::prop_assert_eq!(root, reference_root(&leaves));
        }
    }
}
