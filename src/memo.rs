//! Prediction Memoizer
//!
//! Caches catalogue predictions keyed by `(variant, drug, catalogue)`.
//! A prediction is a pure function of its key, so a stored value can be
//! reused unconditionally for as long as the catalogue behind the identity
//! is unchanged.
//!
//! # Layers
//! - In-run: one [`OnceLock`] per key. Concurrent callers for the same key
//!   block on the first computation, so each key is computed at most once.
//! - Durable: a [`PredictionStore`]. [`DiskStore`] keeps one JSON file per key,
//!   named by the SHA-256 of the key; [`MemoryStore`] keeps nothing on disk.
//!
//! The store is cleared when the memoizer is created unless the run opts
//! in to reusing it.
//!
//! # Disk Layout
//! ```text
//! <cache_dir>/<first two hex digits>/<sha256 hex>.json
//! {"key": {"variant": ..., "drug": ..., "catalogue": ...}, "call": "R"}
//! ```

use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::call::Call;
use crate::catalogue::CatalogueId;
use crate::error::{GwtError, PredictError};

const ENTRY_EXT: &str = "json";

// ============================================================================
// Key
// ============================================================================

/// Identity of one prediction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictionKey {
    pub variant: String,
    pub drug: String,
    pub catalogue: String,
}

impl PredictionKey {
    pub fn new(variant: &str, drug: &str, catalogue: &CatalogueId) -> Self {
        Self {
            variant: variant.to_string(),
            drug: drug.to_string(),
            catalogue: catalogue.to_string(),
        }
    }

    /// Hex SHA-256 over the key fields.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [&self.catalogue, &self.drug, &self.variant] {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Durable storage for predictions.
///
/// Implementations must tolerate concurrent `get`/`put` from many threads.
/// `get` reports unreadable entries as misses.
pub trait PredictionStore: Send + Sync {
    fn get(&self, key: &PredictionKey) -> Option<Call>;
    fn put(&self, key: &PredictionKey, call: Call) -> Result<(), GwtError>;
    fn clear(&self) -> Result<(), GwtError>;
}

/// Process-local store, for runs that should leave nothing on disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<PredictionKey, Call>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PredictionStore for MemoryStore {
    fn get(&self, key: &PredictionKey) -> Option<Call> {
        self.entries.get(key).map(|c| *c)
    }

    fn put(&self, key: &PredictionKey, call: Call) -> Result<(), GwtError> {
        self.entries.insert(key.clone(), call);
        Ok(())
    }

    fn clear(&self) -> Result<(), GwtError> {
        self.entries.clear();
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: PredictionKey,
    call: Call,
}

/// Content-addressed on-disk store.
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place, so readers never see a partial entry. Two writers racing on
/// the same key store the same value; the last rename wins.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Opens (creating if needed) a cache directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, GwtError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &PredictionKey) -> PathBuf {
        let digest = key.digest();
        self.dir
            .join(&digest[..2])
            .join(format!("{}.{}", digest, ENTRY_EXT))
    }

    fn read_entry(path: &Path, key: &PredictionKey) -> Result<Option<Call>, GwtError> {
        let corrupt = |reason: String| GwtError::CacheCorruption {
            path: path.display().to_string(),
            reason,
        };

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(corrupt(e.to_string())),
        };

        let entry: StoredEntry =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        if &entry.key != key {
            return Err(corrupt("entry belongs to a different key".to_string()));
        }
        Ok(Some(entry.call))
    }
}

impl PredictionStore for DiskStore {
    fn get(&self, key: &PredictionKey) -> Option<Call> {
        match Self::read_entry(&self.entry_path(key), key) {
            Ok(call) => call,
            Err(e) => {
                warn!("{}; recomputing", e);
                None
            }
        }
    }

    fn put(&self, key: &PredictionKey, call: Call) -> Result<(), GwtError> {
        let path = self.entry_path(key);
        let parent = path.parent().unwrap_or(self.dir.as_path());
        fs::create_dir_all(parent)?;

        let entry = StoredEntry {
            key: key.clone(),
            call,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer(&mut tmp, &entry).map_err(std::io::Error::from)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Removes entry shards only; anything else in the directory is left alone.
    fn clear(&self) -> Result<(), GwtError> {
        fs::create_dir_all(&self.dir)?;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let is_shard = entry.file_name().to_str().is_some_and(|n| {
                n.len() == 2 && n.bytes().all(|b| b.is_ascii_hexdigit())
            });
            if is_shard && entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Memoizer
// ============================================================================

type Slot = Arc<OnceLock<Result<Call, PredictError>>>;

/// Counters describing how predictions were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    /// Predictions computed by the catalogue.
    pub computed: usize,
    /// Predictions served from the durable store.
    pub stored: usize,
}

/// At-most-once prediction cache shared by all workers of a run.
pub struct PredictionMemo {
    store: Box<dyn PredictionStore>,
    slots: DashMap<PredictionKey, Slot>,
    computed: AtomicUsize,
    stored: AtomicUsize,
}

impl PredictionMemo {
    /// Creates the memoizer. Unless `reuse` is set, the store is cleared first
    /// so that entries from an older catalogue at the same identity are never
    /// served.
    pub fn new<S: PredictionStore + 'static>(store: S, reuse: bool) -> Result<Self, GwtError> {
        if reuse {
            info!("Reusing existing prediction cache");
        } else {
            debug!("Clearing prediction cache");
            store.clear()?;
        }

        Ok(Self {
            store: Box::new(store),
            slots: DashMap::new(),
            computed: AtomicUsize::new(0),
            stored: AtomicUsize::new(0),
        })
    }

    /// Memoizer that keeps predictions in memory only.
    pub fn in_memory() -> Self {
        Self {
            store: Box::new(MemoryStore::new()),
            slots: DashMap::new(),
            computed: AtomicUsize::new(0),
            stored: AtomicUsize::new(0),
        }
    }

    /// Returns the prediction for `key`, running `compute` only if neither
    /// this run nor the durable store has it.
    ///
    /// Errors are remembered for the rest of the run but never persisted.
    pub fn get_or_compute<F>(&self, key: &PredictionKey, compute: F) -> Result<Call, PredictError>
    where
        F: FnOnce() -> Result<Call, PredictError>,
    {
        // shard lock is released at the end of this statement
        let slot: Slot = Arc::clone(&self.slots.entry(key.clone()).or_default());

        slot.get_or_init(|| {
            if let Some(call) = self.store.get(key) {
                self.stored.fetch_add(1, Ordering::Relaxed);
                return Ok(call);
            }

            let outcome = compute();
            self.computed.fetch_add(1, Ordering::Relaxed);
            if let Ok(call) = outcome {
                if let Err(e) = self.store.put(key, call) {
                    warn!("Failed to store prediction for {}/{}: {}", key.variant, key.drug, e);
                }
            }
            outcome
        })
        .clone()
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            computed: self.computed.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
