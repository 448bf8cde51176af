//! Durable seeder store.
//!
//! The snapshot is a JSON array of node names. A sibling `<file>.lock` is
//! held with an exclusive OS file lock for the whole read-modify-write cycle
//! of a selection run, so concurrent runs against the same snapshot
//! serialize. Writes go through [`crate::io::atomic_write`].

use crate::error::{Result, SeedError};
use crate::io;
use crate::types::SeederSet;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SeederStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl SeederStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = lock_path_for(&path);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Block the current thread until the store lock is held.
    pub fn lock_blocking(&self) -> Result<StoreGuard<'_>> {
        let file = acquire(&self.lock_path)?;
        Ok(StoreGuard { store: self, file })
    }

    /// Acquire the store lock without blocking the async runtime.
    pub async fn lock(&self) -> Result<StoreGuard<'_>> {
        let lock_path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || acquire(&lock_path))
            .await
            .map_err(|e| SeedError::Io(std::io::Error::other(e)))??;
        Ok(StoreGuard { store: self, file })
    }

    /// Read the snapshot under the lock.
    pub async fn load(&self) -> Result<SeederSet> {
        let guard = self.lock().await?;
        Ok(guard.load())
    }

    /// Replace the snapshot under the lock.
    pub async fn save(&self, seeders: &SeederSet) -> Result<()> {
        let guard = self.lock().await?;
        guard.save(seeders)
    }
}

/// Exclusive hold on a [`SeederStore`]. The lock is released on drop.
#[derive(Debug)]
pub struct StoreGuard<'a> {
    store: &'a SeederStore,
    file: File,
}

impl StoreGuard<'_> {
    /// Read the snapshot. Missing, empty, unreadable, or corrupt snapshots
    /// all yield an empty set.
    pub fn load(&self) -> SeederSet {
        let path = &self.store.path;
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no seeder snapshot yet");
                return SeederSet::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read seeder snapshot, starting empty");
                return SeederSet::new();
            }
        };
        if data.trim().is_empty() {
            debug!(path = %path.display(), "seeder snapshot is empty");
            return SeederSet::new();
        }
        match serde_json::from_str::<SeederSet>(&data) {
            Ok(set) => {
                debug!(path = %path.display(), count = set.len(), "loaded seeder snapshot");
                set
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt seeder snapshot, starting empty");
                SeederSet::new()
            }
        }
    }

    pub fn save(&self, seeders: &SeederSet) -> Result<()> {
        let data = serde_json::to_string_pretty(seeders)?;
        io::atomic_write(&self.store.path, data.as_bytes())?;
        debug!(path = %self.store.path.display(), count = seeders.len(), "saved seeder snapshot");
        Ok(())
    }
}

impl Drop for StoreGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.store.lock_path.display(), error = %e, "failed to release store lock");
        }
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "seeders".into());
    name.push(".lock");
    path.with_file_name(name)
}

fn acquire(lock_path: &Path) -> Result<File> {
    io::ensure_parent(lock_path)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|source| SeedError::Lock {
            path: lock_path.to_path_buf(),
            source,
        })?;
    file.lock_exclusive().map_err(|source| SeedError::Lock {
        path: lock_path.to_path_buf(),
        source,
    })?;
    Ok(file)
}
