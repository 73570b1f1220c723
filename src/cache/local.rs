//! Local Backend
//!
//! Bounded in-process map persisted to a single JSON file. All state sits
//! behind one mutex; every mutation marks the store dirty and the
//! persistence writer task serializes it and replaces the file atomically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::entry::NewEntry;
use crate::cache::eviction;
use crate::cache::{CacheEntry, PopularQuery};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_persist_task, PersistHandle};

/// On-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<CacheEntry>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    entries: Vec<&'a CacheEntry>,
}

/// Result of a local upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct PutOutcome {
    /// Usage count of the written entry
    pub usage_count: u64,
    /// Hashes removed by the eviction pass, lowest ranked first
    pub evicted: Vec<String>,
    /// Entry count after the write
    pub size: usize,
}

#[derive(Debug)]
struct LocalState {
    entries: HashMap<String, CacheEntry>,
    /// Last timestamp issued; keeps `last_used_at` strictly increasing
    clock: DateTime<Utc>,
    persist: Option<PersistHandle>,
}

impl LocalState {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.clock = if now > self.clock {
            now
        } else {
            self.clock + Duration::nanoseconds(1)
        };
        self.clock
    }

    fn mark_dirty(&self) {
        if let Some(persist) = &self.persist {
            persist.mark_dirty();
        }
    }
}

// == Local Backend ==
#[derive(Debug)]
pub struct LocalBackend {
    state: Arc<Mutex<LocalState>>,
    max_capacity: usize,
    path: Option<PathBuf>,
}

impl LocalBackend {
    // == Open ==
    /// Loads `path` (if present), verifies the location is writable and
    /// starts the persistence writer.
    ///
    /// Fails with [`CacheError::StorageInit`] when the file cannot be written.
    pub async fn open(path: impl Into<PathBuf>, max_capacity: usize) -> Result<Self> {
        let path = path.into();
        if max_capacity == 0 {
            return Err(CacheError::StorageInit(
                "max_capacity must be at least 1".to_string(),
            ));
        }

        let mut entries: HashMap<String, CacheEntry> = load_snapshot(&path)
            .await
            .into_iter()
            .map(|entry| (entry.query_hash.clone(), entry))
            .collect();

        let evicted = eviction::evict(&mut entries, max_capacity);
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Trimmed reloaded cache to capacity");
        }

        let initial = encode_snapshot(entries.values())?;
        write_bytes(&path, &initial).await.map_err(|e| {
            CacheError::StorageInit(format!(
                "cache file {} is not writable: {e}",
                path.display()
            ))
        })?;

        let clock = entries
            .values()
            .map(|entry| entry.last_used_at)
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        info!(
            path = %path.display(),
            entries = entries.len(),
            max_capacity,
            "Local cache opened"
        );

        let state = Arc::new(Mutex::new(LocalState {
            entries,
            clock,
            persist: None,
        }));

        // The writer holds a weak reference so dropping the backend ends it.
        let source = Arc::downgrade(&state);
        let persist = spawn_persist_task(path.clone(), move || {
            let source = source.clone();
            async move {
                let state = source.upgrade()?;
                let state = state.lock().await;
                let encoded = encode_snapshot(state.entries.values());
                Some(encoded)
            }
        });
        state.lock().await.persist = Some(persist);

        Ok(Self {
            state,
            max_capacity,
            path: Some(path),
        })
    }

    // == Ephemeral ==
    /// Memory-only backend with the same eviction semantics and no file.
    pub fn ephemeral(max_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LocalState {
                entries: HashMap::new(),
                clock: DateTime::<Utc>::MIN_UTC,
                persist: None,
            })),
            max_capacity: max_capacity.max(1),
            path: None,
        }
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // == Get ==
    /// Returns a copy of the entry after recording the hit.
    pub async fn get(&self, hash: &str) -> Option<CacheEntry> {
        let mut state = self.state.lock().await;
        if !state.entries.contains_key(hash) {
            return None;
        }
        let now = state.tick();
        let entry = state.entries.get_mut(hash).map(|entry| {
            entry.touch(now);
            entry.clone()
        });
        state.mark_dirty();
        entry
    }

    // == Put ==
    /// Upserts and then evicts if the map grew past capacity.
    pub async fn put(&self, new: NewEntry) -> PutOutcome {
        let mut state = self.state.lock().await;
        let now = state.tick();
        let hash = new.query_hash.clone();

        let usage_count = match state.entries.get_mut(&hash) {
            Some(existing) => {
                existing.overwrite(new, now);
                existing.usage_count
            }
            None => {
                state.entries.insert(hash.clone(), CacheEntry::new(new, now));
                1
            }
        };

        let evicted = eviction::evict(&mut state.entries, self.max_capacity);
        state.mark_dirty();

        PutOutcome {
            usage_count,
            evicted,
            size: state.entries.len(),
        }
    }

    // == Clear ==
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.mark_dirty();
    }

    // == Popular ==
    /// Most used first; ties go to the most recently used.
    pub async fn popular(&self, limit: usize) -> Vec<PopularQuery> {
        let state = self.state.lock().await;
        let mut ranked: Vec<&CacheEntry> = state.entries.values().collect();
        ranked.sort_by(|a, b| eviction::rank(b, a));
        ranked.into_iter().take(limit).map(PopularQuery::from).collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Entry by hash without touching it.
    pub async fn peek(&self, hash: &str) -> Option<CacheEntry> {
        self.state.lock().await.entries.get(hash).cloned()
    }

    // == Close ==
    /// Flushes the last snapshot and stops the writer. Later mutations stay
    /// in memory only.
    pub async fn close(&self) {
        let persist = self.state.lock().await.persist.take();
        if let Some(persist) = persist {
            persist.shutdown().await;
            debug!("Local cache persistence stopped");
        }
    }
}

// == File Format ==
/// Reads the snapshot at `path`. A missing, unreadable or corrupt file
/// yields an empty list; corrupt files are moved aside.
pub async fn load_snapshot(path: &Path) -> Vec<CacheEntry> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read cache file, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Snapshot>(&bytes) {
        Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => snapshot.entries,
        Ok(snapshot) => {
            warn!(version = snapshot.version, "Unsupported cache file version, starting empty");
            set_aside(path).await;
            Vec::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt cache file, starting empty");
            set_aside(path).await;
            Vec::new()
        }
    }
}

async fn set_aside(path: &Path) {
    let backup = path.with_extension("corrupt");
    if let Err(e) = tokio::fs::rename(path, &backup).await {
        warn!(error = %e, "Could not move corrupt cache file aside");
    }
}

/// Serializes entries into the versioned file format.
pub fn encode_snapshot<'a>(entries: impl IntoIterator<Item = &'a CacheEntry>) -> Result<Vec<u8>> {
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        entries: entries.into_iter().collect(),
    };
    Ok(serde_json::to_vec(&snapshot)?)
}

/// Writes `bytes` to `<path>.tmp` and renames it over `path`.
pub async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Encodes `entries` and replaces the file at `path`.
pub async fn write_snapshot(path: &Path, entries: &[CacheEntry]) -> Result<()> {
    write_bytes(path, &encode_snapshot(entries)?).await
}
