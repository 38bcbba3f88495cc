// crates/spacetime-post-merkle/src/cache.rs

//! Merkle cache file: an optional sidecar that stores the top few levels
//! of a plot's Merkle tree so proof generation
//! can skip straight to sibling lookups instead of re-streaming the whole
//! plot for every challenge.
//!
//! The cache is strictly advisory: a plot's validity never depends on its
//! cache existing, being readable, or matching. Every read path here fails
//! soft (`Option::None`), never an error, so callers always have a correct
//! fallback (recompute from the plot itself).

use crate::engine::parent;
use std::io::{self, Read, Write};

const MAGIC: [u8; 4] = *b"SPTC";
const VERSION: u8 = 1;

/// One level of cached Merkle nodes, left to right.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedLevel {
    /// Absolute tree level this array belongs to (0 = leaves).
    pub level: u64,
    /// Node hashes at this level, in ascending index order. A sibling
    /// lookup whose index falls past the end of this array uses the last
    /// element, matching the odd-count self-duplication law.
    pub nodes: Vec<[u8; 32]>,
}

/// A loaded (or freshly built) Merkle cache for one plot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheFile {
    /// Total tree height of the plot this cache was built for.
    pub height: u64,
    /// Levels cached, ordered ascending by level; by convention these are
    /// the topmost `levels.len()` levels, i.e. `height - levels.len() + 1
    /// ..= height`.
    pub levels: Vec<CachedLevel>,
}

impl CacheFile {
    /// Build a cache for the top `levels_cached` levels from a fully
    /// materialized set of per-level node arrays (level 0 = leaves).
    ///
    /// This is only ever called at plot-creation time, where holding all
    /// levels in memory for one pass is an accepted cost; proof generation
    /// and plot loading never materialize full levels.
    #[must_use]
    pub fn from_full_levels(all_levels: &[Vec<[u8; 32]>], levels_cached: u8) -> Self {
        let height = all_levels.len().saturating_sub(1) as u64;
        let k = (levels_cached as usize).min(all_levels.len());
        let start = all_levels.len() - k;
        let levels = all_levels[start..]
            .iter()
            .enumerate()
            .map(|(i, nodes)| CachedLevel {
                level: (start + i) as u64,
                nodes: nodes.clone(),
            })
            .collect();
        Self { height, levels }
    }

    /// The lowest level this cache has data for. `None` if the cache is
    /// empty (zero levels cached).
    #[must_use]
    pub fn boundary_level(&self) -> Option<u64> {
        self.levels.first().map(|l| l.level)
    }

    /// The cached root, if the top level (`height`) is present.
    #[must_use]
    pub fn root(&self) -> Option<[u8; 32]> {
        self.levels
            .last()
            .filter(|l| l.level == self.height)
            .and_then(|l| l.nodes.first().copied())
    }

    /// Sibling hash for `index`'s ancestor at `level`, if that level is
    /// cached. Out-of-range indices fall back to the last node at that
    /// level, matching the self-duplication law for a ragged trailing
    /// block.
    #[must_use]
    pub fn sibling_at_level(&self, level: u64, index: u64) -> Option<[u8; 32]> {
        let cached = self.levels.iter().find(|l| l.level == level)?;
        if cached.nodes.is_empty() {
            return None;
        }
        let sibling_idx = (index >> level) ^ 1;
        let node = cached
            .nodes
            .get(sibling_idx as usize)
            .copied()
            .unwrap_or(*cached.nodes.last().unwrap());
        Some(node)
    }

    /// Serialize to the `SPTC` on-disk layout:
    /// `magic(4) | version(1) | levels_cached(1) | per level: level(8 LE) |
    /// count(4 LE) | count * 32-byte hashes`.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `writer`.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&[VERSION])?;
        writer.write_all(&[self.levels.len() as u8])?;
        for level in &self.levels {
            writer.write_all(&level.level.to_le_bytes())?;
            writer.write_all(&(level.nodes.len() as u32).to_le_bytes())?;
            for node in &level.nodes {
                writer.write_all(node)?;
            }
        }
        Ok(())
    }

    /// Deserialize from the `SPTC` layout. Returns `None` (never an error)
    /// on any structural mismatch: wrong magic, unsupported version,
    /// truncated data, or a malformed count — the cache is advisory, so a
    /// bad file is equivalent to a missing one.
    #[must_use]
    pub fn read<R: Read>(mut reader: R, expected_height: u64) -> Option<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).ok()?;
        if magic != MAGIC {
            return None;
        }
        let mut version = [0u8; 1];
        reader.read_exact(&mut version).ok()?;
        if version[0] != VERSION {
            return None;
        }
        let mut levels_cached = [0u8; 1];
        reader.read_exact(&mut levels_cached).ok()?;

        let mut levels = Vec::with_capacity(levels_cached[0] as usize);
        for _ in 0..levels_cached[0] {
            let mut level_buf = [0u8; 8];
            reader.read_exact(&mut level_buf).ok()?;
            let level = u64::from_le_bytes(level_buf);

            let mut count_buf = [0u8; 4];
            reader.read_exact(&mut count_buf).ok()?;
            let count = u32::from_le_bytes(count_buf);
            // Refuse absurd counts outright rather than attempting a huge
            // allocation on a corrupt file.
            if count > 64 * 1024 * 1024 {
                return None;
            }

            let mut nodes = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let mut node = [0u8; 32];
                reader.read_exact(&mut node).ok()?;
                nodes.push(node);
            }
            levels.push(CachedLevel { level, nodes });
        }

        let cache = Self {
            height: expected_height,
            levels,
        };
        if cache.levels.iter().any(|l| l.level > expected_height) {
            return None;
        }
        Some(cache)
    }
}

/// Materialize every level of a tree (leaves through root) from a complete,
/// in-memory leaf slice, applying the odd-count self-duplication law at
/// each level. `O(N)` memory: only used once, at plot-creation time, to
/// populate a [`CacheFile`].
#[must_use]
pub fn materialize_all_levels(leaves: &[[u8; 32]]) -> Vec<Vec<[u8; 32]>> {
    if leaves.is_empty() {
        return Vec::new();
    }
    let mut levels = vec![leaves.to_vec()];
    while levels.last().unwrap().len() > 1 {
        let cur = levels.last().unwrap();
        let mut padded = cur.clone();
        if padded.len() % 2 == 1 {
            padded.push(*padded.last().unwrap());
        }
        let next: Vec<[u8; 32]> = padded.chunks_exact(2).map(|p| parent(&p[0], &p[1])).collect();
        levels.push(next);
    }
    levels
}
