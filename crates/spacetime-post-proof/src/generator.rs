// crates/spacetime-post-proof/src/generator.rs

//! Proof generator: scans a plot for the leaf minimizing a
//! challenge-dependent score, then produces a Merkle inclusion proof for
//! the winner. A multi-plot variant fans out across loaders with `rayon`
//! and selects the best-of-all result.

use crate::scoring::compute_score;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use spacetime_post_core::cancel::Cancel;
use spacetime_post_core::proof::Proof;
use spacetime_post_core::scanning::{ScanningConfig, ScanningStrategy};
use spacetime_post_merkle::cache::CacheFile;
use spacetime_post_plot::loader::PlotLoader;
use std::cmp::Ordering;
use uuid::Uuid;

/// Outcome of a mining attempt against one or more plots.
///
/// `NoProof` is a distinct, successful outcome — not an error — covering
/// an empty plot set, a strategy yielding zero indices, or every per-plot
/// task failing.
#[derive(Debug)]
pub enum MiningOutcome {
    /// A winning proof was produced.
    Proof(Proof),
    /// No leaf satisfied the scan (or there was nothing to scan).
    NoProof,
    /// The operation was cancelled before a proof could be assembled.
    Cancelled,
}

/// One candidate found during the scan phase: its index and score.
struct Candidate {
    index: u64,
    score: [u8; 32],
}

/// Report `scanned / expected` (in `[0, 100]`) on `progress`, dropping the
/// sample rather than blocking if the bounded(1) channel is already full —
/// the latest value always wins over a stale one sitting in the buffer.
fn report_progress(progress: Option<&Sender<f64>>, scanned: u64, expected: u64) {
    if let Some(tx) = progress {
        let frac = if expected == 0 {
            100.0
        } else {
            (scanned as f64 / expected as f64) * 100.0
        };
        let _ = tx.try_send(frac);
    }
}

/// Scan `loader` for the index minimizing `score = SHA256(challenge ‖
/// leaf)` under `strategy`/`config`, then build and return a [`Proof`] for
/// the winner.
///
/// `progress`, if given, receives the scan phase's fraction complete (in
/// `[0, 100]`) as a "latest value wins" sample; a full bounded(1) channel
/// simply drops the older sample rather than blocking the scan.
///
/// # Errors
///
/// Returns an error if `challenge` is not exactly 32 bytes (a programmer
/// error, surfaced immediately rather than folded into [`MiningOutcome`]),
/// or on I/O failure while reading leaves.
pub fn generate_proof(
    loader: &mut PlotLoader,
    challenge: &[u8; 32],
    strategy: &ScanningStrategy,
    config: &ScanningConfig,
    cancel: Option<&Cancel>,
    progress: Option<&Sender<f64>>,
) -> Result<MiningOutcome> {
    generate_proof_with_cache(loader, None, challenge, strategy, config, cancel, progress)
}

/// As [`generate_proof`], but accepts the plot's optional Merkle cache: the
/// path phase replays only the non-cached lower levels from disk and reads
/// the rest straight out of `cache`, instead of always re-streaming the
/// whole plot.
///
/// # Errors
///
/// Same as [`generate_proof`].
pub fn generate_proof_with_cache(
    loader: &mut PlotLoader,
    cache: Option<&CacheFile>,
    challenge: &[u8; 32],
    strategy: &ScanningStrategy,
    config: &ScanningConfig,
    cancel: Option<&Cancel>,
    progress: Option<&Sender<f64>>,
) -> Result<MiningOutcome> {
    let leaf_count = loader.header().leaf_count as u64;
    let indices = strategy.indices(leaf_count);
    if indices.is_empty() {
        return Ok(MiningOutcome::NoProof);
    }
    let expected = strategy.expected_count(leaf_count);

    let mut best: Option<Candidate> = None;
    let mut scanned = 0u64;

    for (i, &index) in indices.iter().enumerate() {
        if i % 1024 == 0 {
            if let Some(c) = cancel {
                if c.is_cancelled() {
                    return Ok(MiningOutcome::Cancelled);
                }
            }
        }
        let leaf = loader.read_leaf(index).context("reading leaf during scan")?;
        let score = compute_score(challenge, &leaf);
        scanned += 1;
        report_progress(progress, scanned, expected);

        let improves = match &best {
            None => true,
            Some(b) => score_is_better(&score, index, &b.score, b.index),
        };
        if improves {
            best = Some(Candidate { index, score });
        }

        let best_score = best.as_ref().map(|b| &b.score);
        if config.should_stop(scanned, best_score) {
            break;
        }
    }

    let Some(winner) = best else {
        return Ok(MiningOutcome::NoProof);
    };

    if let Some(c) = cancel {
        if c.is_cancelled() {
            return Ok(MiningOutcome::Cancelled);
        }
    }

    let height = loader.header().tree_height as u64;
    let (sibling_hashes, orientation_bits) =
        merkle_path_for_winner(loader, leaf_count, height, winner.index, cache, cancel)?;
    let leaf_value = loader
        .read_leaf(winner.index)
        .context("reading winning leaf value")?;
    let merkle_root = loader.header().merkle_root;

    let proof = Proof {
        leaf_value,
        leaf_index: winner.index,
        sibling_hashes,
        orientation_bits,
        merkle_root,
        challenge: *challenge,
        score: winner.score,
    };
    Ok(MiningOutcome::Proof(proof))
}

/// Build the sibling/orientation path for `target_index`.
///
/// When `cache` is present and its topmost cached level (`boundary`) forms
/// a complete, power-of-two-aligned block containing `target_index`, only
/// that block is read from disk and locally rebuilt for the bottom
/// `boundary` levels; the remaining levels come straight from the cache.
/// Any other case (no cache, or the target falling in the plot's ragged
/// trailing block — the one case the odd-count self-duplication law makes
/// context-dependent) falls back to a full sequential replay, which is
/// always correct.
fn merkle_path_for_winner(
    loader: &mut PlotLoader,
    leaf_count: u64,
    height: u64,
    target_index: u64,
    cache: Option<&CacheFile>,
    cancel: Option<&Cancel>,
) -> Result<(Vec<[u8; 32]>, Vec<bool>)> {
    if let Some(cache) = cache {
        if let Some(boundary) = cache.boundary_level() {
            if boundary > 0 && boundary <= height {
                let block_size = 1u64 << boundary;
                let block_start = (target_index / block_size) * block_size;
                let block_end = (block_start + block_size).min(leaf_count);
                if block_end - block_start == block_size {
                    let block = loader
                        .read_leaves(block_start, block_size)
                        .context("reading cache-accelerated leaf block")?;
                    let local_target = target_index - block_start;
                    let local_path = spacetime_post_merkle::engine::build_with_proof_target(
                        block,
                        block_size,
                        local_target,
                    )
                    .context("building local Merkle subtree for cache-accelerated proof")?;

                    let mut siblings = local_path.sibling_hashes;
                    siblings.reserve((height - boundary) as usize);
                    let mut complete = true;
                    for level in boundary..height {
                        match cache.sibling_at_level(level, target_index) {
                            Some(sibling) => siblings.push(sibling),
                            None => {
                                complete = false;
                                break;
                            }
                        }
                    }
                    if complete {
                        return Ok((siblings, orientation_bits_for(height, target_index)));
                    }
                    // Cache claimed to cover `boundary..height` but a
                    // lookup came back empty (e.g. a stale/partial cache
                    // file); fall through to the full replay below rather
                    // than return an incomplete path.
                }
            }
        }
    }

    // `&mut scan` implements `Iterator` (and so `IntoIterator`) the same
    // way `scan` does, which lets us keep `scan` alive after the builder
    // call to check whether it stopped early.
    let mut scan = loader
        .read_all_leaves()
        .context("replaying leaves for Merkle path")?;
    if let Some(c) = cancel {
        scan = scan.with_cancel(c.clone());
    }
    let path = spacetime_post_merkle::engine::build_with_proof_target(&mut scan, leaf_count, target_index)
        .context("building Merkle path for winning leaf")?;
    scan.into_result()
        .context("replaying leaves for Merkle path")?;
    Ok((path.sibling_hashes, path.orientation_bits))
}

/// Orientation bits for `target_index` across `height` levels: bit 0 of
/// `index >> level` being 0 means the path node is the left child (its
/// sibling sits to the right), matching `spacetime_post_merkle`'s rule.
fn orientation_bits_for(height: u64, target_index: u64) -> Vec<bool> {
    (0..height).map(|lvl| ((target_index >> lvl) & 1) == 0).collect()
}

/// Score-ordering with deterministic tie-break by earlier leaf index
/// within a plot; across plots the manager extends this with `plot_id`.
fn score_is_better(score: &[u8; 32], index: u64, other_score: &[u8; 32], other_index: u64) -> bool {
    match score.cmp(other_score) {
        Ordering::Less => true,
        Ordering::Equal => index < other_index,
        Ordering::Greater => false,
    }
}

/// A proof candidate tagged with the plot it came from, for multi-plot
/// best-of selection.
#[derive(Debug)]
pub struct PlotProof {
    /// Identity of the plot that produced this proof.
    pub plot_id: Uuid,
    /// The proof itself.
    pub proof: Proof,
}

/// Fan out proof generation across every `(plot_id, loader)` pair using a
/// `rayon` work-stealing pool, and select the single best proof overall.
///
/// Per-plot I/O failures are logged and contribute no result rather than
/// aborting the whole fan-out. Ties across plots break by `(plot_id,
/// leaf_index)` lexicographically, which is why the plot id travels
/// alongside each candidate.
///
/// # Errors
///
/// Returns an error only if `challenge` is not exactly 32 bytes; per-plot
/// errors never propagate.
pub fn generate_best_proof(
    loaders: &mut [(Uuid, &mut PlotLoader)],
    challenge: &[u8; 32],
    strategy: &ScanningStrategy,
    config: &ScanningConfig,
    cancel: Option<&Cancel>,
    progress: Option<&Sender<f64>>,
) -> MiningOutcome {
    let mut triples: Vec<(Uuid, &mut PlotLoader, Option<&CacheFile>)> =
        loaders.iter_mut().map(|(id, loader)| (*id, &mut **loader, None)).collect();
    generate_best_proof_with_cache(&mut triples, challenge, strategy, config, cancel, progress)
}

/// As [`generate_best_proof`], but each plot may carry its own optional
/// Merkle cache, used the same way [`generate_proof_with_cache`] uses one.
///
/// Every plot's scan phase reports into the same `progress` channel; since
/// it's a "latest value wins" sample, whichever plot's task happens to
/// finish a leaf last wins the slot — good enough for a single progress
/// indicator covering the whole fan-out.
pub fn generate_best_proof_with_cache(
    loaders: &mut [(Uuid, &mut PlotLoader, Option<&CacheFile>)],
    challenge: &[u8; 32],
    strategy: &ScanningStrategy,
    config: &ScanningConfig,
    cancel: Option<&Cancel>,
    progress: Option<&Sender<f64>>,
) -> MiningOutcome {
    use rayon::prelude::*;

    // `PlotLoader` owns a `File` with interior seek state, so each task
    // needs exclusive access to its own loader; `par_iter_mut` over the
    // slice hands each closure a disjoint `&mut PlotLoader`.
    let results: Vec<Option<PlotProof>> = loaders
        .par_iter_mut()
        .map(|(plot_id, loader, cache)| {
            match generate_proof_with_cache(loader, *cache, challenge, strategy, config, cancel, progress) {
                Ok(MiningOutcome::Proof(proof)) => Some(PlotProof {
                    plot_id: *plot_id,
                    proof,
                }),
                Ok(MiningOutcome::NoProof | MiningOutcome::Cancelled) => None,
                Err(err) => {
                    tracing::warn!(plot_id = %plot_id, error = %err, "proof generation failed for plot");
                    None
                }
            }
        })
        .collect();

    let winner = results.into_iter().flatten().reduce(|a, b| {
        if plot_proof_is_better(&b, &a) {
            b
        } else {
            a
        }
    });

    match winner {
        Some(w) => MiningOutcome::Proof(w.proof),
        None => MiningOutcome::NoProof,
    }
}

/// `true` if `candidate` beats `incumbent`: strictly lower score, or a tie
/// broken by `(plot_id, leaf_index)` lexicographic order.
fn plot_proof_is_better(candidate: &PlotProof, incumbent: &PlotProof) -> bool {
    match candidate.proof.score.cmp(&incumbent.proof.score) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => {
            (candidate.plot_id, candidate.proof.leaf_index)
                < (incumbent.plot_id, incumbent.proof.leaf_index)
        }
    }
}
