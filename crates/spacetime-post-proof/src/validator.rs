// crates/spacetime-post-proof/src/validator.rs

//! Proof validator: independent, pure re-verification of a [`Proof`]
//! against a caller-expected challenge, plot root, and optional difficulty
//! target. Never touches disk and never needs the plot that produced the
//! proof.

use crate::scoring::compute_score;
use spacetime_post_core::proof::Proof;
use spacetime_post_merkle::engine::verify_path;
use thiserror::Error;

/// Why a proof failed validation. Checked in a fixed order: the first
/// failing check is the one returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The proof's `challenge` field does not match the caller-expected
    /// challenge.
    #[error("proof challenge does not match expected challenge")]
    ChallengeMismatch,
    /// The proof's `merkle_root` does not match the caller-expected plot
    /// root.
    #[error("proof merkle root does not match expected plot root")]
    PlotRootMismatch,
    /// `SHA256(challenge ‖ leaf_value) != score`.
    #[error("proof score does not match recomputed SHA256(challenge || leaf)")]
    ScoreMismatch,
    /// A difficulty target was supplied and the score did not beat it.
    #[error("proof score is not strictly below the difficulty target")]
    ScoreAboveTarget,
    /// Walking the Merkle path from `leaf_value` via `sibling_hashes` and
    /// `orientation_bits` did not reproduce `merkle_root`.
    #[error("merkle inclusion path does not reproduce the expected root")]
    InvalidMerklePath,
}

/// Outcome of validating a [`Proof`]. Always returned by value — never a
/// `Result::Err` — since an invalid proof is an expected, ordinary result,
/// not an exceptional one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofValidationResult {
    /// All five checks passed.
    Success,
    /// The first check that failed, in validation order.
    Failure(ValidationError),
}

impl ProofValidationResult {
    /// `true` iff this is [`ProofValidationResult::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Validate `proof` against `expected_challenge` and `expected_root`, and
/// optionally a strict-less-than `difficulty_target`.
///
/// Checks run in a fixed order; the first failure is returned.
#[must_use]
pub fn validate(
    proof: &Proof,
    expected_challenge: &[u8; 32],
    expected_root: &[u8; 32],
    difficulty_target: Option<&[u8; 32]>,
) -> ProofValidationResult {
    if &proof.challenge != expected_challenge {
        return ProofValidationResult::Failure(ValidationError::ChallengeMismatch);
    }
    if &proof.merkle_root != expected_root {
        return ProofValidationResult::Failure(ValidationError::PlotRootMismatch);
    }
    if compute_score(&proof.challenge, &proof.leaf_value) != proof.score {
        return ProofValidationResult::Failure(ValidationError::ScoreMismatch);
    }
    if let Some(target) = difficulty_target {
        if proof.score >= *target {
            return ProofValidationResult::Failure(ValidationError::ScoreAboveTarget);
        }
    }
    if !verify_path(
        &proof.leaf_value,
        &proof.sibling_hashes,
        &proof.orientation_bits,
        &proof.merkle_root,
    ) {
        return ProofValidationResult::Failure(ValidationError::InvalidMerklePath);
    }
    ProofValidationResult::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{generate_proof, MiningOutcome};
    use spacetime_post_core::scanning::{ScanningConfig, ScanningStrategy};
    use spacetime_post_plot::config::PlotConfig;
    use spacetime_post_plot::creator::create_plot;
    use spacetime_post_plot::loader::PlotLoader;
    use tempfile::tempdir;

    fn make_proof() -> (Proof, [u8; 32]) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.plot");
        let cfg = PlotConfig::new_unchecked(32 * 2048, [1u8; 32], [2u8; 32], 0);
        create_plot(&cfg, &path, None, None, None).unwrap();
        let mut loader = PlotLoader::open(&path).unwrap();
        let root = loader.header().merkle_root;
        let challenge = [0x42u8; 32];
        let MiningOutcome::Proof(proof) = generate_proof(
            &mut loader,
            &challenge,
            &ScanningStrategy::FullScan,
            &ScanningConfig::unbounded(),
            None,
            None,
        )
        .unwrap() else {
            panic!("expected a proof");
        };
        (proof, root)
    }

    #[test]
    fn valid_proof_validates() {
        let (proof, root) = make_proof();
        let result = validate(&proof, &proof.challenge, &root, None);
        assert_eq!(result, ProofValidationResult::Success);
    }

    #[test]
    fn tampered_sibling_is_rejected() {
        let (mut proof, root) = make_proof();
        proof.sibling_hashes[0][0] ^= 1;
        let result = validate(&proof, &proof.challenge, &root, None);
        assert_eq!(
            result,
            ProofValidationResult::Failure(ValidationError::InvalidMerklePath)
        );
    }

    #[test]
    fn wrong_challenge_is_rejected_first() {
        let (proof, root) = make_proof();
        let wrong = [0xAAu8; 32];
        let result = validate(&proof, &wrong, &root, None);
        assert_eq!(
            result,
            ProofValidationResult::Failure(ValidationError::ChallengeMismatch)
        );
    }

    #[test]
    fn wrong_root_is_rejected_before_score() {
        let (proof, _root) = make_proof();
        let wrong_root = [0xBBu8; 32];
        let result = validate(&proof, &proof.challenge, &wrong_root, None);
        assert_eq!(
            result,
            ProofValidationResult::Failure(ValidationError::PlotRootMismatch)
        );
    }

    #[test]
    fn tampered_score_is_rejected() {
        let (mut proof, root) = make_proof();
        proof.score[0] ^= 1;
        let result = validate(&proof, &proof.challenge, &root, None);
        assert_eq!(
            result,
            ProofValidationResult::Failure(ValidationError::ScoreMismatch)
        );
    }

    #[test]
    fn score_above_target_is_rejected() {
        let (proof, root) = make_proof();
        // A target of all-zero bytes is below every possible score.
        let target = [0u8; 32];
        let result = validate(&proof, &proof.challenge, &root, Some(&target));
        assert_eq!(
            result,
            ProofValidationResult::Failure(ValidationError::ScoreAboveTarget)
        );
    }

    #[test]
    fn score_below_target_passes() {
        let (proof, root) = make_proof();
        let target = [0xFFu8; 32];
        let result = validate(&proof, &proof.challenge, &root, Some(&target));
        assert_eq!(result, ProofValidationResult::Success);
    }

    #[test]
    fn tampered_leaf_value_is_rejected() {
        let (mut proof, root) = make_proof();
        proof.leaf_value[0] ^= 1;
        let result = validate(&proof, &proof.challenge, &root, None);
        // Flipping the leaf changes the recomputed score before the path
        // is even walked.
        assert_eq!(
            result,
            ProofValidationResult::Failure(ValidationError::ScoreMismatch)
        );
    }

    #[test]
    fn tampered_orientation_bit_is_rejected() {
        let (mut proof, root) = make_proof();
        proof.orientation_bits[0] = !proof.orientation_bits[0];
        let result = validate(&proof, &proof.challenge, &root, None);
        assert_eq!(
            result,
            ProofValidationResult::Failure(ValidationError::InvalidMerklePath)
        );
    }
}
