use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use super::FileExtraction;

const MEMORY_CAPACITY: usize = 4096;

/// Bumped whenever the extraction output changes shape or meaning, so stale
/// disk entries are never read back.
const CACHE_FORMAT_VERSION: u32 = 1;

/// Modification time (ns since the epoch) and size of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub modified_ns: u64,
    pub size: u64,
}

impl FileStamp {
    pub fn of(file_path: &Path) -> Result<Self> {
        let metadata = fs::metadata(file_path)?;
        let modified_ns = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Ok(Self {
            modified_ns,
            size: metadata.len(),
        })
    }
}

/// An extraction together with the stamp of the file it was taken from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedExtraction {
    pub extraction: FileExtraction,
    pub stamp: FileStamp,
}

/// Bincode files under one directory, one per source path.
struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    fn open(dir: PathBuf) -> Option<Self> {
        match fs::create_dir_all(&dir) {
            Ok(()) => Some(Self { dir }),
            Err(err) => {
                warn!("Disk cache disabled, cannot create {}: {err}", dir.display());
                None
            }
        }
    }

    fn entry_path(&self, file_path: &Path) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        CACHE_FORMAT_VERSION.hash(&mut hasher);
        file_path.hash(&mut hasher);
        self.dir.join(format!("extract_{:016x}.bincode", hasher.finish()))
    }

    fn load(&self, file_path: &Path) -> Option<CachedExtraction> {
        let bytes = fs::read(self.entry_path(file_path)).ok()?;
        match bincode::deserialize(&bytes) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("Discarding unreadable cache entry for {}: {err}", file_path.display());
                None
            }
        }
    }

    fn save(&self, file_path: &Path, entry: &CachedExtraction) -> Result<()> {
        fs::write(self.entry_path(file_path), bincode::serialize(entry)?)?;
        Ok(())
    }

    fn len(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }

    fn wipe(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Extraction results shared by the extraction workers.
///
/// Entries are only served while the file's stamp is unchanged. The disk
/// layer is best effort: any I/O failure degrades to a cache miss.
pub struct ParseCache {
    memory: DashMap<PathBuf, CachedExtraction>,
    disk: Option<DiskStore>,
}

impl ParseCache {
    /// Memory cache backed by `cache_dir`, or `reachscan_cache` under the
    /// system temp dir.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        let dir = cache_dir.unwrap_or_else(|| std::env::temp_dir().join("reachscan_cache"));
        Self {
            memory: DashMap::with_capacity(MEMORY_CAPACITY),
            disk: DiskStore::open(dir),
        }
    }

    pub fn in_memory_only() -> Self {
        Self {
            memory: DashMap::with_capacity(MEMORY_CAPACITY),
            disk: None,
        }
    }

    pub fn get(&self, file_path: &Path) -> Option<FileExtraction> {
        let stamp = FileStamp::of(file_path).ok()?;

        if let Some(hit) = self
            .memory
            .get(file_path)
            .filter(|entry| entry.stamp == stamp)
        {
            return Some(hit.extraction.clone());
        }

        let entry = self.disk.as_ref()?.load(file_path)?;
        if entry.stamp != stamp {
            return None;
        }
        let extraction = entry.extraction.clone();
        self.remember(file_path, entry);
        Some(extraction)
    }

    pub fn store(&self, file_path: &Path, extraction: &FileExtraction) -> Result<()> {
        let entry = CachedExtraction {
            extraction: extraction.clone(),
            stamp: FileStamp::of(file_path)?,
        };

        if let Some(disk) = &self.disk {
            disk.save(file_path, &entry)?;
        }
        self.remember(file_path, entry);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.memory.clear();
        if let Some(disk) = &self.disk {
            disk.wipe()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entries: self.memory.len(),
            disk_entries: self.disk.as_ref().map_or(0, DiskStore::len),
        }
    }

    /// Inserts into memory, evicting an arbitrary entry when full.
    fn remember(&self, file_path: &Path, entry: CachedExtraction) {
        if self.memory.len() >= MEMORY_CAPACITY && !self.memory.contains_key(file_path) {
            let victim = self.memory.iter().next().map(|e| e.key().clone());
            if let Some(victim) = victim {
                self.memory.remove(&victim);
            }
        }
        self.memory.insert(file_path.to_path_buf(), entry);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
}
