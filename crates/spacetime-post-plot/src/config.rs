// crates/spacetime-post-plot/src/config.rs

//! Plot creator configuration: the only inputs needed to deterministically
//! derive a plot's leaves and header.

use spacetime_post_core::PlotError;

/// Minimum allowed plot size: 100 MiB.
pub const MIN_PLOT_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Not enforced — a documented soft cap implementers may surface in UX.
/// No maximum plot size is imposed; this crate exposes the recommendation
/// without validating against it.
#[must_use]
pub fn recommended_soft_cap_bytes() -> u64 {
    1024 * 1024 * 1024 * 1024 // 1 TiB
}

/// Validated configuration for [`crate::creator::create_plot`].
///
/// Fields are `pub(crate)`, not `pub`: outside this crate the only way to
/// build one is [`Self::new`], which enforces the 100 MiB floor, or
/// [`Self::new_unchecked`], which doesn't but says so in its name.
/// `create_plot` trusts whichever one produced its `&PlotConfig` rather
/// than re-deriving the floor itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlotConfig {
    pub(crate) plot_size_bytes: u64,
    pub(crate) pubkey: [u8; 32],
    pub(crate) seed: [u8; 32],
    pub(crate) cache_levels: u32,
}

impl PlotConfig {
    /// Validate and derive `leaf_count`.
    ///
    /// # Errors
    ///
    /// Returns [`PlotError::InvalidArgument`] if `plot_size_bytes` is below
    /// the 100 MiB floor.
    pub fn new(
        plot_size_bytes: u64,
        pubkey: [u8; 32],
        seed: [u8; 32],
        cache_levels: u32,
    ) -> Result<Self, PlotError> {
        if plot_size_bytes < MIN_PLOT_SIZE_BYTES {
            return Err(PlotError::InvalidArgument("plot_size_bytes must be at least 100 MiB"));
        }
        Ok(Self {
            plot_size_bytes,
            pubkey,
            seed,
            cache_levels,
        })
    }

    /// Build a config without enforcing the 100 MiB floor.
    ///
    /// Intended for tests and tooling that need small plots to run
    /// quickly; real plot creation should always go through [`Self::new`]
    /// so the floor can't be bypassed by accident.
    #[must_use]
    pub fn new_unchecked(plot_size_bytes: u64, pubkey: [u8; 32], seed: [u8; 32], cache_levels: u32) -> Self {
        Self {
            plot_size_bytes,
            pubkey,
            seed,
            cache_levels,
        }
    }

    /// Requested plot size in bytes.
    #[must_use]
    pub fn plot_size_bytes(&self) -> u64 {
        self.plot_size_bytes
    }

    /// Public key this plot is bound to.
    #[must_use]
    pub fn pubkey(&self) -> [u8; 32] {
        self.pubkey
    }

    /// Deterministic leaf-generation seed.
    #[must_use]
    pub fn seed(&self) -> [u8; 32] {
        self.seed
    }

    /// Number of top Merkle levels to cache (0 disables the cache file).
    #[must_use]
    pub fn cache_levels(&self) -> u32 {
        self.cache_levels
    }

    /// `floor(plot_size_bytes / 32)`.
    #[must_use]
    pub fn leaf_count(&self) -> u64 {
        self.plot_size_bytes / 32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_below_minimum() {
        assert!(PlotConfig::new(1024, [0; 32], [0; 32], 0).is_err());
    }

    #[test]
    fn minimum_size_plot_yields_known_leaf_count() {
        // 100 MiB -> 3,355,443 leaves.
        let cfg = PlotConfig::new(MIN_PLOT_SIZE_BYTES, [1; 32], [2; 32], 0).unwrap();
        assert_eq!(cfg.leaf_count(), 3_355_443);
    }

    #[test]
    fn new_unchecked_bypasses_the_floor() {
        let cfg = PlotConfig::new_unchecked(32 * 10, [1; 32], [2; 32], 0);
        assert_eq!(cfg.leaf_count(), 10);
    }
}
