//! Retention-managed clip storage. One `ClipStore` exclusively owns one
//! directory of temporary WAV clips: space-checked writes, age- and
//! count-based eviction, and containment-guarded deletion. Files that do
//! not match the store's prefix and extension are never touched.

pub mod sys;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Local;
use tracing::{debug, warn};

use echovoice_foundation::StoreError;

const FILE_EXTENSION: &str = "wav";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Eviction limits for the managed directory.
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    pub max_file_age_ms: u64,
    pub max_file_count: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            // Clips are transient upload material; an hour is generous.
            max_file_age_ms: 60 * 60 * 1000,
            max_file_count: 10,
        }
    }
}

/// Handle to one persisted clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredClip {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Wall-clock save time, milliseconds since the Unix epoch.
    pub created_ms: i64,
}

pub struct ClipStore {
    dir: PathBuf,
    prefix: String,
}

impl ClipStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an encoded clip under a timestamped name.
    ///
    /// Fails with `InsufficientStorage` when available space is below twice
    /// the payload size (filesystem-overhead margin). A partially written
    /// file is removed before a write error propagates.
    pub fn save(&self, data: &[u8]) -> Result<StoredClip, StoreError> {
        fs::create_dir_all(&self.dir)?;

        let needed = (data.len() as u64).saturating_mul(2);
        if let Some(available) = sys::available_bytes(&self.dir) {
            if available < needed {
                return Err(StoreError::InsufficientStorage { needed, available });
            }
        }

        let path = self.next_path();
        if let Err(e) = fs::write(&path, data) {
            let _ = fs::remove_file(&path);
            return Err(StoreError::Write(e));
        }

        debug!(path = %path.display(), bytes = data.len(), "clip saved");
        Ok(StoredClip {
            path,
            size_bytes: data.len() as u64,
            created_ms: Local::now().timestamp_millis(),
        })
    }

    /// Delete managed files older than `max_age`. Returns how many were
    /// removed. Already-absent files are not an error.
    pub fn cleanup_by_age(&self, max_age: Duration) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;
        for (path, modified) in self.managed_files() {
            let expired = now
                .duration_since(modified)
                .map(|age| age > max_age)
                .unwrap_or(false);
            if expired && self.remove_quietly(&path) {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "age cleanup evicted clips");
        }
        removed
    }

    /// Delete oldest managed files until at most `max_count` remain.
    pub fn cleanup_by_count(&self, max_count: usize) -> usize {
        let mut files = self.managed_files();
        if files.len() <= max_count {
            return 0;
        }
        // Timestamped names tie-break equal mtimes deterministically.
        files.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let excess = files.len() - max_count;
        let mut removed = 0;
        for (path, _) in files.into_iter().take(excess) {
            if self.remove_quietly(&path) {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "count cleanup evicted clips");
        }
        removed
    }

    /// Delete one file, but only if it lives inside the managed directory.
    /// Anything else is refused and the filesystem is left unchanged.
    pub fn delete(&self, path: &Path) -> bool {
        let Ok(dir) = self.dir.canonicalize() else {
            return false;
        };
        let Some(parent) = path.parent() else {
            return false;
        };
        let Ok(parent) = parent.canonicalize() else {
            return false;
        };
        if parent != dir {
            warn!(path = %path.display(), "refusing to delete file outside the store");
            return false;
        }
        self.remove_quietly(path)
    }

    /// Delete every managed file.
    pub fn clear_all(&self) -> usize {
        let mut removed = 0;
        for (path, _) in self.managed_files() {
            if self.remove_quietly(&path) {
                removed += 1;
            }
        }
        removed
    }

    /// Paths of all managed files (prefix + extension filtered).
    pub fn list(&self) -> Vec<PathBuf> {
        self.managed_files().into_iter().map(|(p, _)| p).collect()
    }

    fn managed_files(&self) -> Vec<(PathBuf, SystemTime)> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !self.is_managed(&path) {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, modified));
        }
        files
    }

    fn is_managed(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return false,
        };
        name.starts_with(&format!("{}_", self.prefix))
            && path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION)
    }

    fn next_path(&self) -> PathBuf {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let base = format!("{}_{}", self.prefix, timestamp);
        let mut path = self.dir.join(format!("{base}.{FILE_EXTENSION}"));
        // Two saves can land in the same millisecond; bump a suffix.
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{base}_{n}.{FILE_EXTENSION}"));
            n += 1;
        }
        path
    }

    fn remove_quietly(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), "failed to delete clip: {e}");
                false
            }
        }
    }
}
