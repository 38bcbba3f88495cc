// crates/spacetime-post-cli/src/main.rs

//! Demo CLI for the Spacetime PoST mining core: create a plot, load it,
//! mine a challenge, verify a proof, and manage a plot registry. This is
//! test/demo tooling for exercising the library end-to-end, not the
//! surrounding node's real operator CLI (which owns config/YAML loading,
//! networking, and consensus — out of scope here).

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use spacetime_post_core::scanning::{ScanningConfig, ScanningStrategy};
use spacetime_post_manager::PlotManager;
use spacetime_post_plot::config::PlotConfig;
use spacetime_post_plot::creator::create_plot;
use spacetime_post_plot::loader::PlotLoader;
use spacetime_post_proof::generator::{generate_proof_with_cache, MiningOutcome};
use spacetime_post_proof::validator::{validate, ProofValidationResult};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "spacetime-post-cli",
    about = "Spacetime PoST mining core demo CLI",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a new plot file.
    CreatePlot {
        /// Output plot file path.
        #[arg(long)]
        out: PathBuf,
        /// Plot size in bytes (minimum 100 MiB).
        #[arg(long)]
        size_bytes: u64,
        /// 64-character hex-encoded 32-byte public key.
        #[arg(long)]
        pubkey: String,
        /// 64-character hex-encoded 32-byte seed.
        #[arg(long)]
        seed: String,
        /// Number of top Merkle levels to cache (0 disables the cache file).
        #[arg(long, default_value_t = 0)]
        cache_levels: u32,
        /// Optional cache file output path.
        #[arg(long)]
        cache_out: Option<PathBuf>,
    },

    /// Load a plot and print its header.
    Inspect {
        /// Plot file path.
        #[arg(long)]
        plot: PathBuf,
        /// Also rebuild the Merkle root from every leaf and compare it.
        #[arg(long, default_value_t = false)]
        verify_root: bool,
    },

    /// Mine a single plot against a challenge and print the resulting proof.
    Mine {
        /// Plot file path.
        #[arg(long)]
        plot: PathBuf,
        /// 64-character hex-encoded 32-byte challenge.
        #[arg(long)]
        challenge: String,
        /// Output path for the JSON-encoded proof.
        #[arg(long)]
        out: PathBuf,
        /// Optional Merkle cache sidecar to accelerate the proof path.
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Validate a previously mined proof against an expected challenge and root.
    Verify {
        /// Path to a JSON-encoded proof (as written by `mine`).
        #[arg(long)]
        proof: PathBuf,
        /// 64-character hex-encoded 32-byte expected challenge.
        #[arg(long)]
        challenge: String,
        /// 64-character hex-encoded 32-byte expected plot root.
        #[arg(long)]
        root: String,
        /// Optional 64-character hex-encoded 32-byte difficulty target.
        #[arg(long)]
        target: Option<String>,
    },

    /// Register a plot in a persisted manager registry.
    RegistryAdd {
        /// Path to the JSON registry file (created if absent).
        #[arg(long)]
        registry: PathBuf,
        /// Plot file path to register.
        #[arg(long)]
        plot: PathBuf,
        /// Optional Merkle cache sidecar to associate with this plot.
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Fan out proof generation across every valid plot in a registry.
    RegistryMine {
        /// Path to the JSON registry file.
        #[arg(long)]
        registry: PathBuf,
        /// 64-character hex-encoded 32-byte challenge.
        #[arg(long)]
        challenge: String,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::CreatePlot {
            out,
            size_bytes,
            pubkey,
            seed,
            cache_levels,
            cache_out,
        } => cmd_create_plot(out, size_bytes, pubkey, seed, cache_levels, cache_out),
        Cmd::Inspect { plot, verify_root } => cmd_inspect(plot, verify_root),
        Cmd::Mine { plot, challenge, out, cache } => cmd_mine(plot, challenge, out, cache),
        Cmd::Verify {
            proof,
            challenge,
            root,
            target,
        } => cmd_verify(proof, challenge, root, target),
        Cmd::RegistryAdd { registry, plot, cache } => cmd_registry_add(registry, plot, cache),
        Cmd::RegistryMine { registry, challenge } => cmd_registry_mine(registry, challenge),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn parse_hex32(s: &str, what: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s).with_context(|| format!("{what} is not valid hex"))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow::anyhow!("{what} must decode to exactly 32 bytes, got {}", v.len()))
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

fn cmd_create_plot(
    out: PathBuf,
    size_bytes: u64,
    pubkey: String,
    seed: String,
    cache_levels: u32,
    cache_out: Option<PathBuf>,
) -> Result<()> {
    let pubkey = parse_hex32(&pubkey, "pubkey")?;
    let seed = parse_hex32(&seed, "seed")?;
    let config = PlotConfig::new(size_bytes, pubkey, seed, cache_levels)
        .context("validating plot configuration")?;

    ensure_parent_dir(&out)?;
    info!(out = %out.display(), leaf_count = config.leaf_count(), "creating plot");

    let mut cb = |pct: u8| info!(pct, "plot creation progress");
    let header = create_plot(&config, &out, cache_out.as_deref(), Some(&mut cb), None)
        .context("creating plot")?;

    println!(
        "created plot {} ({} leaves, height {}, root {})",
        out.display(),
        header.leaf_count,
        header.tree_height,
        hex::encode(header.merkle_root)
    );
    Ok(())
}

fn cmd_inspect(plot: PathBuf, verify_root: bool) -> Result<()> {
    let mut loader = PlotLoader::open(&plot).context("opening plot")?;
    let header = *loader.header();
    println!("plot: {}", plot.display());
    println!("  version:      {}", header.version);
    println!("  leaf_count:   {}", header.leaf_count);
    println!("  leaf_size:    {}", header.leaf_size);
    println!("  tree_height:  {}", header.tree_height);
    println!("  merkle_root:  {}", hex::encode(header.merkle_root));

    if verify_root {
        let ok = loader.verify_merkle_root().context("rebuilding merkle root")?;
        println!("  root_verified: {ok}");
        if !ok {
            bail!("plot {} failed full Merkle root verification", plot.display());
        }
    }
    Ok(())
}

fn cmd_mine(plot: PathBuf, challenge: String, out: PathBuf, cache: Option<PathBuf>) -> Result<()> {
    let challenge = parse_hex32(&challenge, "challenge")?;
    let mut loader = PlotLoader::open(&plot).context("opening plot")?;

    let cache_file = cache
        .map(|path| {
            let bytes = std::fs::read(&path).with_context(|| format!("reading cache {}", path.display()))?;
            let height = loader.header().tree_height as u64;
            spacetime_post_merkle::cache::CacheFile::read(&bytes[..], height)
                .with_context(|| format!("parsing cache {}", path.display()))
        })
        .transpose()?;

    info!(plot = %plot.display(), cached = cache_file.is_some(), "scanning plot for challenge");
    let outcome = generate_proof_with_cache(
        &mut loader,
        cache_file.as_ref(),
        &challenge,
        &ScanningStrategy::FullScan,
        &ScanningConfig::unbounded(),
        None,
        None,
    )
    .context("generating proof")?;

    match outcome {
        MiningOutcome::Proof(proof) => {
            ensure_parent_dir(&out)?;
            let json = serde_json::to_vec_pretty(&proof).context("serializing proof")?;
            std::fs::write(&out, json).with_context(|| format!("writing proof to {}", out.display()))?;
            println!(
                "mined leaf {} with score {} -> {}",
                proof.leaf_index,
                hex::encode(proof.score),
                out.display()
            );
        }
        MiningOutcome::NoProof => println!("no proof found"),
        MiningOutcome::Cancelled => println!("mining cancelled"),
    }
    Ok(())
}

fn cmd_verify(proof: PathBuf, challenge: String, root: String, target: Option<String>) -> Result<()> {
    let challenge = parse_hex32(&challenge, "challenge")?;
    let root = parse_hex32(&root, "root")?;
    let target = target.map(|t| parse_hex32(&t, "target")).transpose()?;

    let bytes = std::fs::read(&proof).with_context(|| format!("reading proof {}", proof.display()))?;
    let proof: spacetime_post_core::proof::Proof =
        serde_json::from_slice(&bytes).context("parsing proof JSON")?;

    let result = validate(&proof, &challenge, &root, target.as_ref());
    match result {
        ProofValidationResult::Success => {
            println!("OK: proof is valid");
            Ok(())
        }
        ProofValidationResult::Failure(err) => {
            println!("REJECTED: {err}");
            bail!("proof validation failed: {err}");
        }
    }
}

fn cmd_registry_add(registry: PathBuf, plot: PathBuf, cache: Option<PathBuf>) -> Result<()> {
    let manager = PlotManager::new();
    if registry.exists() {
        manager.load(&registry);
    }
    let id = manager.add(&plot, cache.as_deref());
    manager.persist(&registry).context("persisting registry")?;
    println!(
        "registered {} as {id} (status {:?}) -> {}",
        plot.display(),
        manager.status_of(id),
        registry.display()
    );
    Ok(())
}

fn cmd_registry_mine(registry: PathBuf, challenge: String) -> Result<()> {
    let challenge = parse_hex32(&challenge, "challenge")?;
    let manager = PlotManager::new();
    manager.load(&registry);
    info!(plots = manager.count(), "fanning out proof generation");

    let outcome = manager.generate_proof(
        &challenge,
        &ScanningStrategy::FullScan,
        &ScanningConfig::unbounded(),
        None,
        None,
    );
    match outcome {
        MiningOutcome::Proof(proof) => println!(
            "best proof: leaf {} score {}",
            proof.leaf_index,
            hex::encode(proof.score)
        ),
        MiningOutcome::NoProof => println!("no proof found across {} plots", manager.count()),
        MiningOutcome::Cancelled => println!("mining cancelled"),
    }
    Ok(())
}
