// crates/spacetime-post-core/src/scanning.rs

//! Scanning strategy and configuration value objects.
//!
//! A [`ScanningStrategy`] describes *which* leaf indices a proof generator
//! examines; a [`ScanningConfig`] describes *when* it should stop early.
//! Both are pure value objects with no I/O.

use serde::{Deserialize, Serialize};

/// Choice of which leaf indices to examine for a given challenge.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanningStrategy {
    /// Examine every index `0..leaf_count`.
    FullScan,
    /// Examine `n` evenly-spaced indices across `leaf_count`.
    Sampling(u64),
    /// Examine whole contiguous blocks of `leaves_per_block` leaves,
    /// `block_size` blocks spaced across the plot, for locality of
    /// reference during scanning.
    CacheFriendly {
        /// Number of blocks to sample.
        block_size: u64,
        /// Leaves examined per sampled block.
        leaves_per_block: u64,
    },
}

impl ScanningStrategy {
    /// Total number of indices this strategy will yield for a plot with
    /// `leaf_count` leaves.
    #[must_use]
    pub fn expected_count(&self, leaf_count: u64) -> u64 {
        match self {
            Self::FullScan => leaf_count,
            Self::Sampling(n) => (*n).min(leaf_count),
            Self::CacheFriendly {
                block_size,
                leaves_per_block,
            } => {
                if leaf_count == 0 {
                    return 0;
                }
                let per_block = (*leaves_per_block).min(leaf_count);
                let blocks = (*block_size).min(leaf_count.div_ceil(per_block.max(1)));
                blocks * per_block
            }
        }
    }

    /// Construct the index iterator for a plot with `leaf_count` leaves.
    ///
    /// Indices are always yielded in strictly ascending order, which lets
    /// callers feed them directly into a sequential scan without sorting.
    #[must_use]
    pub fn indices(&self, leaf_count: u64) -> Vec<u64> {
        if leaf_count == 0 {
            return Vec::new();
        }
        match self {
            Self::FullScan => (0..leaf_count).collect(),
            Self::Sampling(n) => {
                let n = (*n).min(leaf_count).max(1);
                if n >= leaf_count {
                    return (0..leaf_count).collect();
                }
                // Evenly spaced indices across [0, leaf_count).
                let mut out = Vec::with_capacity(n as usize);
                for i in 0..n {
                    let idx = i.saturating_mul(leaf_count) / n;
                    out.push(idx.min(leaf_count - 1));
                }
                out.dedup();
                out
            }
            Self::CacheFriendly {
                block_size,
                leaves_per_block,
            } => {
                let per_block = (*leaves_per_block).min(leaf_count).max(1);
                let total_blocks = leaf_count.div_ceil(per_block);
                let blocks = (*block_size).min(total_blocks).max(1);
                let mut out = Vec::new();
                for b in 0..blocks {
                    let start = b.saturating_mul(leaf_count.saturating_sub(per_block)) / blocks.max(1);
                    for off in 0..per_block {
                        let idx = start + off;
                        if idx < leaf_count {
                            out.push(idx);
                        }
                    }
                }
                out.sort_unstable();
                out.dedup();
                out
            }
        }
    }
}

/// Termination policy for a proof-generation scan.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ScanningConfig {
    /// Stop early once a score with at least this many leading zero bits
    /// (counted from the most significant bit of byte 0) has been found.
    pub quality_threshold_leading_zero_bits: Option<u32>,
    /// Stop after examining this many leaves, regardless of quality.
    pub max_leaves: Option<u64>,
}

impl ScanningConfig {
    /// No early termination: scan every index the strategy yields.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Count of leading zero bits in `score`, from the MSB of byte 0.
    #[must_use]
    pub fn leading_zero_bits(score: &[u8; 32]) -> u32 {
        let mut bits = 0u32;
        for byte in score {
            if *byte == 0 {
                bits += 8;
            } else {
                bits += byte.leading_zeros();
                break;
            }
        }
        bits
    }

    /// Whether `score` satisfies the configured quality threshold (or there
    /// is no threshold, in which case every score satisfies it).
    #[must_use]
    pub fn meets_quality(&self, score: &[u8; 32]) -> bool {
        match self.quality_threshold_leading_zero_bits {
            None => false,
            Some(target) => Self::leading_zero_bits(score) >= target,
        }
    }

    /// Whether the scan should stop after examining `leaves_scanned` leaves
    /// and observing `best_score_so_far`.
    #[must_use]
    pub fn should_stop(&self, leaves_scanned: u64, best_score_so_far: Option<&[u8; 32]>) -> bool {
        if let Some(max) = self.max_leaves {
            if leaves_scanned >= max {
                return true;
            }
        }
        if let Some(score) = best_score_so_far {
            if self.meets_quality(score) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scan_is_every_index() {
        let s = ScanningStrategy::FullScan;
        assert_eq!(s.indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(s.expected_count(5), 5);
    }

    #[test]
    fn sampling_caps_at_leaf_count() {
        let s = ScanningStrategy::Sampling(1000);
        assert_eq!(s.indices(4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn sampling_is_ascending_and_within_bounds() {
        let s = ScanningStrategy::Sampling(10);
        let idx = s.indices(1000);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));
        assert!(idx.iter().all(|&i| i < 1000));
    }

    #[test]
    fn sampling_equals_full_scan_on_matching_count() {
        // Sampling(1024) on a 1024-leaf plot visits every index.
        let full = ScanningStrategy::FullScan.indices(1024);
        let sampled = ScanningStrategy::Sampling(1024).indices(1024);
        assert_eq!(full, sampled);
    }

    #[test]
    fn leading_zero_bits_counts_from_msb() {
        let mut score = [0xFFu8; 32];
        assert_eq!(ScanningConfig::leading_zero_bits(&score), 0);
        score[0] = 0x00;
        score[1] = 0x0F;
        assert_eq!(ScanningConfig::leading_zero_bits(&score), 12);
        score = [0u8; 32];
        assert_eq!(ScanningConfig::leading_zero_bits(&score), 256);
    }

    #[test]
    fn should_stop_on_max_leaves_or_quality() {
        let cfg = ScanningConfig {
            quality_threshold_leading_zero_bits: Some(4),
            max_leaves: Some(10),
        };
        assert!(cfg.should_stop(10, None));
        let mut good = [0xFFu8; 32];
        good[0] = 0x00;
        assert!(cfg.should_stop(1, Some(&good)));
        let bad = [0xFFu8; 32];
        assert!(!cfg.should_stop(1, Some(&bad)));
    }
}
