// crates/spacetime-post-core/src/leaf.rs

//! Leaf generation: `leaf(pubkey, seed, nonce) = SHA256(pubkey ‖ seed ‖ nonce_le64)`.
//!
//! Pure and referentially transparent. The nonce is serialized little-endian
//! regardless of host platform — this is a wire contract, not an
//! implementation detail.

use crate::cancel::Cancel;
use crate::error::PlotError;
use sha2::{Digest, Sha256};

/// Compute a single 32-byte leaf hash.
///
/// # Errors
///
/// Returns [`PlotError::InvalidArgument`] if `pubkey` or `seed` is not
/// exactly 32 bytes.
pub fn leaf(pubkey: &[u8], seed: &[u8], nonce: u64) -> Result<[u8; 32], PlotError> {
    if pubkey.len() != 32 {
        return Err(PlotError::InvalidArgument("pubkey must be exactly 32 bytes"));
    }
    if seed.len() != 32 {
        return Err(PlotError::InvalidArgument("seed must be exactly 32 bytes"));
    }
    Ok(leaf_unchecked(pubkey, seed, nonce))
}

/// Compute a leaf hash without re-validating input lengths.
///
/// Callers that have already validated `pubkey`/`seed` (e.g. the lazy
/// [`Leaves`] iterator, which checks once up front) use this to avoid
/// re-checking per nonce.
#[inline]
#[must_use]
pub(crate) fn leaf_unchecked(pubkey: &[u8], seed: &[u8], nonce: u64) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(pubkey);
    h.update(seed);
    h.update(nonce.to_le_bytes());
    h.finalize().into()
}

/// Construct the lazy, finite, non-restartable leaf sequence for
/// `[start_nonce, start_nonce + count)`.
///
/// # Errors
///
/// Returns [`PlotError::InvalidArgument`] if `pubkey` or `seed` is not
/// exactly 32 bytes.
pub fn leaves(pubkey: &[u8], seed: &[u8], start_nonce: u64, count: u64) -> Result<Leaves, PlotError> {
    if pubkey.len() != 32 {
        return Err(PlotError::InvalidArgument("pubkey must be exactly 32 bytes"));
    }
    if seed.len() != 32 {
        return Err(PlotError::InvalidArgument("seed must be exactly 32 bytes"));
    }
    let mut pk = [0u8; 32];
    let mut sd = [0u8; 32];
    pk.copy_from_slice(pubkey);
    sd.copy_from_slice(seed);
    Ok(Leaves {
        pubkey: pk,
        seed: sd,
        next_nonce: start_nonce,
        remaining: count,
        cancel: None,
        on_leaf: None,
    })
}

/// A finite, non-restartable, pull-based iterator over leaves in strict
/// nonce-ascending order.
///
/// Checks cooperative cancellation between items and optionally invokes a
/// per-leaf progress callback after each leaf is produced.
pub struct Leaves {
    pubkey: [u8; 32],
    seed: [u8; 32],
    next_nonce: u64,
    remaining: u64,
    cancel: Option<Cancel>,
    on_leaf: Option<Box<dyn FnMut(u64) + Send>>,
}

impl Leaves {
    /// Attach a cancellation token; cancellation is observed between items
    /// (the item already in flight is always completed).
    #[must_use]
    pub fn with_cancel(mut self, cancel: Cancel) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Attach a per-leaf progress callback, invoked with the nonce just
    /// produced after each successful `next()`.
    #[must_use]
    pub fn with_progress<F: FnMut(u64) + Send + 'static>(mut self, f: F) -> Self {
        self.on_leaf = Some(Box::new(f));
        self
    }

    /// Number of leaves not yet produced.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Iterator for Leaves {
    type Item = [u8; 32];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if let Some(c) = &self.cancel {
            if c.is_cancelled() {
                self.remaining = 0;
                return None;
            }
        }
        let nonce = self.next_nonce;
        let h = leaf_unchecked(&self.pubkey, &self.seed, nonce);
        self.next_nonce += 1;
        self.remaining -= 1;
        if let Some(cb) = &mut self.on_leaf {
            cb(nonce);
        }
        Some(h)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Leaves {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length_inputs() {
        assert!(leaf(&[0u8; 31], &[0u8; 32], 0).is_err());
        assert!(leaf(&[0u8; 32], &[0u8; 33], 0).is_err());
        assert!(leaf(&[0u8; 32], &[0u8; 32], 0).is_ok());
    }

    #[test]
    fn all_zero_inputs_are_deterministic_and_match_direct_hash() {
        let pk = [0u8; 32];
        let sd = [0u8; 32];
        let a = leaf(&pk, &sd, 0).unwrap();
        let b = leaf(&pk, &sd, 0).unwrap();
        assert_eq!(a, b);

        // Direct recomputation of the formula.
        let mut h = Sha256::new();
        h.update(pk);
        h.update(sd);
        h.update(0u64.to_le_bytes());
        let expected: [u8; 32] = h.finalize().into();
        assert_eq!(a, expected);
    }

    #[test]
    fn leaves_are_nonce_ascending_and_match_leaf() {
        let pk = [7u8; 32];
        let sd = [9u8; 32];
        let seq: Vec<_> = leaves(&pk, &sd, 5, 4).unwrap().collect();
        assert_eq!(seq.len(), 4);
        for (i, h) in seq.iter().enumerate() {
            assert_eq!(*h, leaf(&pk, &sd, 5 + i as u64).unwrap());
        }
    }

    #[test]
    fn leaves_respect_cancellation() {
        let pk = [1u8; 32];
        let sd = [2u8; 32];
        let cancel = Cancel::new();
        let mut it = leaves(&pk, &sd, 0, 1000).unwrap().with_cancel(cancel.clone());
        assert!(it.next().is_some());
        cancel.cancel();
        assert!(it.next().is_none());
    }

    #[test]
    fn leaves_report_progress() {
        let pk = [1u8; 32];
        let sd = [2u8; 32];
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let it = leaves(&pk, &sd, 10, 3)
            .unwrap()
            .with_progress(move |n| seen2.lock().unwrap().push(n));
        let _: Vec<_> = it.collect();
        assert_eq!(*seen.lock().unwrap(), vec![10, 11, 12]);
    }

    proptest::proptest! {
        #[test]
        fn leaf_determinism_across_runs(
            pk in proptest::collection::vec(proptest::prelude::any::<u8>(), 32..=32),
            sd in proptest::collection::vec(proptest::prelude::any::<u8>(), 32..=32),
            n in 0u64..1_000_000,
        ) {
            let a = leaf(&pk, &sd, n).unwrap();
            let b = leaf(&pk, &sd, n).unwrap();
            proptest::prop_assert_eq!(a, b);
        }
    }
}
