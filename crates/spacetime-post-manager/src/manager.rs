// crates/spacetime-post-manager/src/manager.rs

//! Plot manager: registry of plots with status tracking, metadata
//! persistence, and fan-out proof generation.
//!
//! Concurrency discipline: a coarse write lock serializes
//! `add`/`remove`/`refresh`/`persist` (infrequent, inherently
//! serializable); reads (`count`, `status_of`, iteration) never take it and
//! go straight to the lock-free [`DashMap`].

use crate::events::{EventBus, PlotEvent};
use crate::metadata::{parse_registry_document, serialize_registry_document, PlotMetadata, PlotStatus};
use anyhow::{Context, Result};
use chrono::Utc;
use crossbeam_channel::Receiver;
use dashmap::DashMap;
use spacetime_post_core::cancel::Cancel;
use spacetime_post_core::scanning::{ScanningConfig, ScanningStrategy};
use spacetime_post_merkle::cache::CacheFile;
use spacetime_post_plot::loader::PlotLoader;
use spacetime_post_proof::generator::{generate_best_proof_with_cache, MiningOutcome};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

/// A registry entry: lightweight metadata plus an optional slot index into
/// the manager's loader arena (present only while `status == Valid`).
struct PlotEntry {
    metadata: PlotMetadata,
    slot: Option<usize>,
}

/// An open loader paired with its optional Merkle cache, advisory and only
/// ever consulted as an acceleration of proof generation.
struct OpenPlot {
    loader: PlotLoader,
    cache: Option<CacheFile>,
}

/// Load and parse the cache sidecar at `cache_path` against `expected_height`,
/// if a path was recorded and the file exists and parses. Never an error:
/// a missing or unreadable cache is equivalent to no cache.
fn load_cache(cache_path: &str, expected_height: u64) -> Option<CacheFile> {
    if cache_path.is_empty() {
        return None;
    }
    let bytes = std::fs::read(cache_path).ok()?;
    CacheFile::read(&bytes[..], expected_height)
}

/// Lifecycle registry for a set of plots, with fan-out proof generation
/// across every currently-`Valid` plot.
pub struct PlotManager {
    entries: DashMap<Uuid, PlotEntry>,
    /// Case-insensitive path -> plot id, for duplicate-path coalescing.
    path_index: DashMap<String, Uuid>,
    /// Dense slab of open loaders; `entries[id].slot` indexes into this.
    slots: RwLock<Vec<Option<OpenPlot>>>,
    /// Serializes add/remove/refresh/persist; reads never take it.
    write_lock: Mutex<()>,
    events: EventBus,
}

impl Default for PlotManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PlotManager {
    /// Construct an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            path_index: DashMap::new(),
            slots: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
            events: EventBus::new(),
        }
    }

    /// Subscribe to plot lifecycle events (fire-and-forget, at-least-once).
    #[must_use]
    pub fn subscribe(&self) -> Receiver<PlotEvent> {
        self.events.subscribe()
    }

    /// Number of registered plots (any status).
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Current status of a registered plot, if it exists.
    #[must_use]
    pub fn status_of(&self, plot_id: Uuid) -> Option<PlotStatus> {
        self.entries.get(&plot_id).map(|e| e.metadata.status)
    }

    /// A snapshot copy of every registered plot's metadata.
    #[must_use]
    pub fn metadata_snapshot(&self) -> Vec<PlotMetadata> {
        self.entries.iter().map(|e| e.metadata.clone()).collect()
    }

    fn normalize_path(path: &Path) -> String {
        path.to_string_lossy().to_ascii_lowercase()
    }

    /// Register `path` (and optional `cache_path`), loading it via the
    /// Plot Loader. Duplicate paths (case-insensitive) are coalesced: a
    /// re-add of an already-registered path returns the existing plot id
    /// without opening a second loader.
    ///
    /// The entry is recorded as `Valid` if the plot opens and validates,
    /// `Corrupted` if it exists but fails to parse, or `Missing` if the
    /// file is absent — registration itself never fails on a bad plot;
    /// these are recorded statuses, not propagated errors.
    pub fn add(&self, path: &Path, cache_path: Option<&Path>) -> Uuid {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let key = Self::normalize_path(path);
        if let Some(existing) = self.path_index.get(&key) {
            return *existing;
        }

        let plot_id = Uuid::new_v4();
        let cache_file_path = cache_path.map_or_else(String::new, |p| p.to_string_lossy().into_owned());
        let (status, slot, space_allocated_bytes, merkle_root) = match PlotLoader::open(path) {
            Ok(loader) => {
                let root = loader.header().merkle_root;
                let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                let cache = load_cache(&cache_file_path, loader.header().tree_height as u64);
                let mut slots = self.slots.write().unwrap_or_else(|p| p.into_inner());
                slots.push(Some(OpenPlot { loader, cache }));
                (PlotStatus::Valid, Some(slots.len() - 1), size, root)
            }
            Err(spacetime_post_core::PlotError::Missing) => {
                (PlotStatus::Missing, None, 0, [0u8; 32])
            }
            Err(_) => (PlotStatus::Corrupted, None, 0, [0u8; 32]),
        };

        let metadata = PlotMetadata {
            plot_id,
            file_path: path.to_string_lossy().into_owned(),
            cache_file_path,
            space_allocated_bytes,
            merkle_root,
            created_at_utc: Utc::now(),
            status,
        };

        self.path_index.insert(key, plot_id);
        self.entries.insert(plot_id, PlotEntry { metadata: metadata.clone(), slot });
        self.events.publish(PlotEvent::PlotAdded(metadata));
        plot_id
    }

    /// Remove a plot from the registry, closing its loader if one is
    /// open. No-op if `plot_id` is not registered.
    pub fn remove(&self, plot_id: Uuid) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let Some((_, entry)) = self.entries.remove(&plot_id) else {
            return;
        };
        self.path_index.retain(|_, v| *v != plot_id);
        if let Some(slot) = entry.slot {
            let mut slots = self.slots.write().unwrap_or_else(|p| p.into_inner());
            if let Some(s) = slots.get_mut(slot) {
                *s = None;
            }
        }
        self.events.publish(PlotEvent::PlotRemoved(plot_id));
    }

    /// Re-check every entry's status, opening or closing loaders as
    /// needed. Returns the number of entries whose status changed.
    ///
    /// Transitions: `Valid -> Corrupted`/`Missing` if the file no longer
    /// validates, `Corrupted -> Valid` if a previously bad file now
    /// parses, `Missing -> Valid` if the file has reappeared.
    pub fn refresh(&self) -> usize {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let ids: Vec<Uuid> = self.entries.iter().map(|e| *e.key()).collect();
        let mut transitions = 0usize;

        for id in ids {
            let Some(mut entry_ref) = self.entries.get_mut(&id) else {
                continue;
            };
            let path = PathBuf::from(&entry_ref.metadata.file_path);
            let old_status = entry_ref.metadata.status;

            match PlotLoader::open(&path) {
                Ok(loader) => {
                    let root = loader.header().merkle_root;
                    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    let cache = load_cache(&entry_ref.metadata.cache_file_path, loader.header().tree_height as u64);
                    let open = OpenPlot { loader, cache };
                    let mut slots = self.slots.write().unwrap_or_else(|p| p.into_inner());
                    let slot = match entry_ref.slot {
                        Some(s) if s < slots.len() => {
                            slots[s] = Some(open);
                            s
                        }
                        _ => {
                            slots.push(Some(open));
                            slots.len() - 1
                        }
                    };
                    drop(slots);
                    entry_ref.slot = Some(slot);
                    entry_ref.metadata.status = PlotStatus::Valid;
                    entry_ref.metadata.merkle_root = root;
                    entry_ref.metadata.space_allocated_bytes = size;
                }
                Err(spacetime_post_core::PlotError::Missing) => {
                    if let Some(slot) = entry_ref.slot.take() {
                        let mut slots = self.slots.write().unwrap_or_else(|p| p.into_inner());
                        if let Some(s) = slots.get_mut(slot) {
                            *s = None;
                        }
                    }
                    entry_ref.metadata.status = PlotStatus::Missing;
                }
                Err(_) => {
                    if let Some(slot) = entry_ref.slot.take() {
                        let mut slots = self.slots.write().unwrap_or_else(|p| p.into_inner());
                        if let Some(s) = slots.get_mut(slot) {
                            *s = None;
                        }
                    }
                    entry_ref.metadata.status = PlotStatus::Corrupted;
                }
            }

            if entry_ref.metadata.status != old_status {
                transitions += 1;
            }
        }
        transitions
    }

    /// Persist the registry to `path` as a JSON document, using a
    /// temp-file-then-rename discipline so a crash mid-write never leaves
    /// a half-written registry behind.
    ///
    /// # Errors
    ///
    /// Propagates I/O or serialization failures.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let entries = self.metadata_snapshot();
        let bytes = serialize_registry_document(&entries).context("serializing plot registry")?;

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))
            .context("creating temp file for registry persist")?;
        use std::io::Write;
        tmp.write_all(&bytes).context("writing registry temp file")?;
        tmp.flush().context("flushing registry temp file")?;
        tmp.persist(path)
            .map_err(|e| anyhow::anyhow!("renaming registry temp file into place: {e}"))?;
        Ok(())
    }

    /// Load a registry previously written by [`Self::persist`], replacing
    /// this manager's current entries. Each surviving entry's plot is
    /// re-opened via the Plot Loader to populate a fresh slot (so the
    /// manager is ready for `generate_proof` immediately after loading).
    ///
    /// A corrupt or unreadable metadata file is recoverable: the manager
    /// simply starts with zero entries rather than erroring.
    pub fn load(&self, path: &Path) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let bytes = std::fs::read(path).unwrap_or_default();
        let entries = parse_registry_document(&bytes);

        self.entries.clear();
        self.path_index.clear();
        {
            let mut slots = self.slots.write().unwrap_or_else(|p| p.into_inner());
            slots.clear();
        }

        for mut metadata in entries {
            let path = PathBuf::from(&metadata.file_path);
            let slot = match PlotLoader::open(&path) {
                Ok(loader) => {
                    metadata.status = PlotStatus::Valid;
                    let cache = load_cache(&metadata.cache_file_path, loader.header().tree_height as u64);
                    let mut slots = self.slots.write().unwrap_or_else(|p| p.into_inner());
                    slots.push(Some(OpenPlot { loader, cache }));
                    Some(slots.len() - 1)
                }
                Err(spacetime_post_core::PlotError::Missing) => {
                    metadata.status = PlotStatus::Missing;
                    None
                }
                Err(_) => {
                    metadata.status = PlotStatus::Corrupted;
                    None
                }
            };
            let key = Self::normalize_path(&path);
            self.path_index.insert(key, metadata.plot_id);
            self.entries.insert(metadata.plot_id, PlotEntry { metadata, slot });
        }
    }

    /// Fan out proof generation across every currently-`Valid` loader and
    /// return the best overall [`MiningOutcome`].
    ///
    /// `progress`, if given, receives each plot task's scan-phase fraction
    /// complete as a "latest value wins" sample; see
    /// `spacetime_post_proof::generator::generate_best_proof_with_cache`.
    pub fn generate_proof(
        &self,
        challenge: &[u8; 32],
        strategy: &ScanningStrategy,
        config: &ScanningConfig,
        cancel: Option<&Cancel>,
        progress: Option<&crossbeam_channel::Sender<f64>>,
    ) -> MiningOutcome {
        let valid_slots: Vec<(Uuid, usize)> = self
            .entries
            .iter()
            .filter(|e| e.metadata.status == PlotStatus::Valid)
            .filter_map(|e| e.slot.map(|s| (*e.key(), s)))
            .collect();

        let mut slots = self.slots.write().unwrap_or_else(|p| p.into_inner());
        let mut triples: Vec<(Uuid, &mut PlotLoader, Option<&CacheFile>)> =
            Vec::with_capacity(valid_slots.len());
        // Build disjoint mutable references into `slots` by index; each
        // `(plot_id, slot)` pair names a distinct index, so this is safe.
        let mut remaining: &mut [Option<OpenPlot>] = &mut slots;
        let mut base = 0usize;
        let mut sorted = valid_slots;
        sorted.sort_by_key(|&(_, s)| s);
        for (plot_id, slot) in sorted {
            let offset = slot - base;
            let (_, rest) = remaining.split_at_mut(offset);
            let (first, rest2) = rest.split_at_mut(1);
            if let Some(open) = first[0].as_mut() {
                triples.push((plot_id, &mut open.loader, open.cache.as_ref()));
            }
            remaining = rest2;
            base = slot + 1;
        }

        generate_best_proof_with_cache(&mut triples, challenge, strategy, config, cancel, progress)
    }
}
