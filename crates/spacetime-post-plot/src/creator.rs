// crates/spacetime-post-plot/src/creator.rs

//! Plot creator: single-pass plot file creation.
//!
//! Writes leaves to disk while simultaneously feeding the same sequence
//! into the streaming Merkle engine, then seeks back and writes the
//! header once the root is known. Atomicity is best-effort: on failure the
//! caller is left a partially written file with no valid header, which is
//! indistinguishable from corruption and will simply fail to load.

use crate::config::PlotConfig;
use anyhow::{Context, Result};
use spacetime_post_core::cancel::Cancel;
use spacetime_post_core::header::{PlotHeader, HEADER_LEN};
use spacetime_post_core::leaf::leaves;
use spacetime_post_merkle::cache::{materialize_all_levels, CacheFile};
use spacetime_post_merkle::engine::StreamingMerkleBuilder;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// Progress callback: invoked with a debounced integer percentage
/// (`0..=100`), emitted only when the value changes from the last call.
pub type CreateProgress<'a> = dyn FnMut(u8) + Send + 'a;

/// Create a plot file at `out_path` per `config`, optionally writing a
/// Merkle cache sidecar to `cache_path`.
///
/// # Errors
///
/// Returns an error on any I/O failure, or if leaf generation is
/// cancelled via `cancel` (partial output is left on disk for the caller
/// to remove).
pub fn create_plot(
    config: &PlotConfig,
    out_path: &Path,
    cache_path: Option<&Path>,
    mut progress: Option<&mut CreateProgress<'_>>,
    cancel: Option<Cancel>,
) -> Result<PlotHeader> {
    let leaf_count = config.leaf_count();
    let file = File::create(out_path)
        .with_context(|| format!("creating plot file at {}", out_path.display()))?;
    let mut writer = BufWriter::new(file);

    // Reserve the header region with zero bytes; the real header is
    // written last, once the root is known.
    writer
        .write_all(&[0u8; HEADER_LEN])
        .context("reserving header region")?;

    let want_cache = config.cache_levels > 0 && cache_path.is_some();
    let mut builder = StreamingMerkleBuilder::new();
    let mut cache_leaves: Vec<[u8; 32]> = if want_cache {
        Vec::with_capacity(leaf_count as usize)
    } else {
        Vec::new()
    };

    let mut last_reported: i64 = -1;
    let mut written: u64 = 0;

    let mut it = leaves(&config.pubkey, &config.seed, 0, leaf_count)?;
    if let Some(c) = cancel {
        it = it.with_cancel(c);
    }

    for leaf in it {
        writer.write_all(&leaf).context("writing leaf")?;
        builder.push(leaf);
        if want_cache {
            cache_leaves.push(leaf);
        }
        written += 1;

        if leaf_count > 0 {
            let pct = ((written * 100) / leaf_count) as i64;
            if pct != last_reported {
                last_reported = pct;
                if let Some(cb) = progress.as_deref_mut() {
                    cb(pct as u8);
                }
            }
        }
    }

    if written != leaf_count {
        anyhow::bail!("leaf generation cancelled after {written}/{leaf_count} leaves");
    }

    let (root, _height) = builder
        .finish()
        .context("finalizing streaming Merkle root")?;
    let header = PlotHeader::new(config.seed, leaf_count as i64, root)
        .context("building plot header")?;

    writer.flush().context("flushing plot file")?;
    let mut file = writer.into_inner().context("unwrapping plot writer")?;
    file.seek(SeekFrom::Start(0)).context("seeking to header")?;
    file.write_all(&header.serialize()).context("writing header")?;
    file.flush().context("flushing header")?;

    if let (true, Some(cpath)) = (want_cache, cache_path) {
        let levels = materialize_all_levels(&cache_leaves);
        let cache = CacheFile::from_full_levels(&levels, config.cache_levels as u8);
        let cache_file =
            File::create(cpath).with_context(|| format!("creating cache file at {}", cpath.display()))?;
        let mut cw = BufWriter::new(cache_file);
        cache.write(&mut cw).context("writing cache file")?;
        cw.flush().context("flushing cache file")?;
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PlotLoader;
    use tempfile::tempdir;

    fn small_config() -> PlotConfig {
        // Below the 100 MiB production floor; tests use a relaxed
        // constructor so the suite doesn't need gigabytes of scratch disk.
        PlotConfig {
            plot_size_bytes: 32 * 5_000,
            pubkey: [3u8; 32],
            seed: [4u8; 32],
            cache_levels: 4,
        }
    }

    #[test]
    fn create_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let plot_path = dir.path().join("test.plot");
        let cache_path = dir.path().join("test.cache");
        let cfg = small_config();

        let header = create_plot(&cfg, &plot_path, Some(&cache_path), None, None).unwrap();
        assert_eq!(header.leaf_count as u64, cfg.leaf_count());

        let loader = PlotLoader::open(&plot_path).unwrap();
        assert_eq!(loader.header().leaf_count, header.leaf_count);
        assert!(loader.verify_merkle_root().unwrap());
        assert!(cache_path.exists());
    }

    #[test]
    fn progress_is_debounced_to_distinct_values() {
        let dir = tempdir().unwrap();
        let plot_path = dir.path().join("p.plot");
        let cfg = small_config();

        let mut ticks = Vec::new();
        let mut cb = |pct: u8| ticks.push(pct);
        create_plot(&cfg, &plot_path, None, Some(&mut cb), None).unwrap();

        assert!(ticks.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*ticks.last().unwrap(), 100);
    }

    #[test]
    fn cancellation_leaves_partial_file_and_errors() {
        let dir = tempdir().unwrap();
        let plot_path = dir.path().join("cancelled.plot");
        let cfg = PlotConfig {
            plot_size_bytes: 32 * 1_000_000,
            ..small_config()
        };
        let cancel = Cancel::new();
        cancel.cancel();
        let result = create_plot(&cfg, &plot_path, None, None, Some(cancel));
        assert!(result.is_err());
        assert!(plot_path.exists());
    }
}
