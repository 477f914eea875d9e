//! Directory-rooted, size-bounded filesystem with atomic ingest

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use sysinfo::Disks;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{BufferError, Result};

/// How often `above_quota` is allowed to trust its cached size before it
/// re-derives the true size by a full recursive traversal.
const SIZE_RECOMPUTE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Below this fraction of free space on the store's mount, `above_quota`
/// reports full regardless of the byte quota.
const MIN_FREE_SPACE_FRACTION: f64 = 0.10;

/// A single path component is "portable" if it is non-empty, not a
/// directory-traversal token, and free of characters that common
/// filesystems reject or treat specially.
pub fn is_portable_component(component: &str) -> bool {
    if component.is_empty() || component == "." || component == ".." {
        return false;
    }
    if component.len() > 255 {
        return false;
    }
    const INVALID: &[char] = &['/', '\\', '\0', ':', '*', '?', '"', '<', '>', '|'];
    !component.chars().any(|c| INVALID.contains(&c))
}

/// A hash is portable if it is non-empty and every slash-delimited
/// component of it is a portable filename.
pub fn is_portable_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.split('/').all(is_portable_component)
}

/// Lexically normalize a path (resolve `.` and `..` components) without
/// touching the filesystem. Used to reject unsafe store roots before the
/// root directory necessarily exists.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}

/// Directory-rooted, size-bounded filesystem with atomic ingest.
///
/// Owns a root directory and a cached total-size accounting. Every mutating
/// method here is only ever called while the owning [`crate::Buffer`] holds
/// its internal mutex, so `Store` itself performs no locking of its own.
pub struct Store {
    root: PathBuf,
    quota_bytes: u64,
    size: u64,
    last_size_update: Instant,
}

impl Store {
    /// Create a store rooted at `parent/buffer_name`, creating the root
    /// directory if it doesn't already exist.
    pub fn new(buffer_name: &str, parent: &Path, gigabyte_quota: f64) -> Result<Self> {
        if buffer_name.is_empty() {
            return Err(BufferError::InvalidConfig(
                "buffer_name must not be empty".into(),
            ));
        }
        if gigabyte_quota <= 0.0 {
            return Err(BufferError::InvalidConfig(
                "gigabyte_quota must be positive".into(),
            ));
        }

        let root = parent.join(buffer_name);
        let root_n = lexical_normalize(&root);
        let parent_n = lexical_normalize(parent);
        let grandparent_n = parent_n.parent().map(Path::to_path_buf);

        if root_n == parent_n || grandparent_n.as_deref() == Some(root_n.as_path()) {
            return Err(BufferError::InvalidConfig(format!(
                "unsafe store root {root_n:?} (equal to parent or parent's parent)"
            )));
        }

        fs::create_dir_all(&root)?;
        info!(root = %root.display(), "store root ready");

        let size = Self::recompute_size(&root);
        Ok(Self {
            root,
            quota_bytes: (gigabyte_quota * 1024.0 * 1024.0 * 1024.0) as u64,
            size,
            last_size_update: Instant::now(),
        })
    }

    /// Full recursive traversal of `root`, summing file sizes. Directories
    /// are excluded from the sum; errors reading an individual entry are
    /// skipped without aborting the scan.
    fn recompute_size(root: &Path) -> u64 {
        let mut total = 0u64;
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file()
                && let Ok(metadata) = entry.metadata()
            {
                total += metadata.len();
            }
        }
        total
    }

    /// True if the store is over its byte quota, or if the underlying
    /// mount's free-space fraction has dropped below 10%.
    ///
    /// If more than 10 minutes have elapsed since the cached size was last
    /// refreshed, this recomputes it by a full traversal first.
    pub fn above_quota(&mut self) -> bool {
        if self.last_size_update.elapsed() > SIZE_RECOMPUTE_INTERVAL {
            debug!("size cache stale, recomputing by full traversal");
            self.size = Self::recompute_size(&self.root);
            self.last_size_update = Instant::now();
        }

        if self.size > self.quota_bytes {
            return true;
        }

        self.free_space_fraction() < MIN_FREE_SPACE_FRACTION
    }

    fn free_space_fraction(&self) -> f64 {
        let disks = Disks::new_with_refreshed_list();
        let root = self.root.as_path();

        let mut best: Option<(&Path, u64, u64)> = None;
        for disk in disks.list() {
            let mount = disk.mount_point();
            if root.starts_with(mount) {
                let better = match best {
                    None => true,
                    Some((cur, _, _)) => mount.as_os_str().len() > cur.as_os_str().len(),
                };
                if better {
                    best = Some((mount, disk.available_space(), disk.total_space()));
                }
            }
        }

        match best {
            Some((_, available, total)) if total > 0 => available as f64 / total as f64,
            _ => 1.0,
        }
    }

    /// Resolve `root/name`. Returns `false` if the resolved path is a
    /// directory or does not exist; otherwise deletes the file, updates the
    /// cached size, and prunes now-empty ancestor directories back up to
    /// (but not including) `root`.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let path = self.root.join(name);
        if path.is_dir() || !path.exists() {
            return Ok(false);
        }

        let size = fs::metadata(&path)?.len();
        fs::remove_file(&path)?;
        self.size = self.size.saturating_sub(size);

        self.prune_empty_ancestors(&path)?;
        Ok(true)
    }

    /// Walk upward from `file_path`'s parent directory, removing each
    /// now-empty ancestor, stopping at (and without removing) `root`.
    fn prune_empty_ancestors(&self, file_path: &Path) -> Result<()> {
        let root_canonical = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());

        let mut dir = match file_path.parent() {
            Some(p) => p.to_path_buf(),
            None => return Ok(()),
        };

        loop {
            let dir_canonical = dir.canonicalize().unwrap_or_else(|_| dir.clone());
            if dir_canonical == root_canonical {
                break;
            }
            let Ok(mut entries) = fs::read_dir(&dir) else {
                break;
            };
            if entries.next().is_some() {
                break;
            }
            if fs::remove_dir(&dir).is_err() {
                break;
            }
            let Some(parent) = dir.parent() else { break };
            dir = parent.to_path_buf();
        }
        Ok(())
    }

    /// The root directory, as a display-ready string.
    pub fn get_buffer_directory(&self) -> String {
        self.root.display().to_string()
    }

    /// The full path for `name` if it exists on disk, else an empty string.
    ///
    /// Callers use the empty-string result as the signal that a catalog
    /// entry referencing `name` is orphaned.
    pub fn get_existing_filepath(&self, name: &str) -> String {
        let path = self.root.join(name);
        if path.exists() {
            path.display().to_string()
        } else {
            String::new()
        }
    }

    /// Unconditional join of `root` and `name`, with no existence check.
    pub fn get_filepath(&self, name: &str) -> String {
        self.root.join(name).display().to_string()
    }

    /// Move `src_abspath` into the store under `dst_relname`.
    ///
    /// Fails (returns `Ok(false)`) if the destination already exists (as a
    /// file or a directory) or the source does not exist. Creates parent
    /// directories of the destination as needed. Attempts a rename first;
    /// on cross-filesystem errors, falls back to copy-then-delete.
    pub fn move_into(&mut self, src_abspath: &Path, dst_relname: &str) -> Result<bool> {
        let dst = self.root.join(dst_relname);
        if dst.exists() || !src_abspath.exists() {
            return Ok(false);
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        if fs::rename(src_abspath, &dst).is_err() {
            debug!(
                src = %src_abspath.display(),
                dst = %dst.display(),
                "rename failed, falling back to copy+remove"
            );
            fs::copy(src_abspath, &dst)?;
            fs::remove_file(src_abspath)?;
        }

        let size = fs::metadata(&dst)?.len();
        self.size += size;
        Ok(true)
    }

    /// Current cached total size in bytes (test/introspection hook).
    pub fn cached_size(&self) -> u64 {
        self.size
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
