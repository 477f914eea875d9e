//! The public façade: composes [`Store`] and [`Catalog`] behind a mutex

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::catalog::{Catalog, InsertOutcome};
use crate::error::Result;
use crate::hash::{HashFn, default_hash_fn};
use crate::store::Store;
use crate::time::snap_to_minute;
use crate::types::{CatalogItem, Device, Keep, TimeValue};

/// Fixed directory name for the store root under `parent`.
const BUFFER_NAME: &str = "indexed_buffer";

/// On-disk filename of the catalog's index file.
const INDEX_FILENAME: &str = "indexed_data.db";

/// Default byte quota, in GiB.
const DEFAULT_GIGABYTE_QUOTA: f64 = 2.0;

struct BufferInner {
    store: Store,
    hash_fn: HashFn,
}

/// The public contract over a durable, quota-bounded, content-addressed
/// artifact buffer.
///
/// Every state-touching method takes the buffer's single internal lock for
/// its entire duration, giving total ordering over the pair `(Store,
/// Catalog)` from this façade's perspective. See `spec.md` §5.
pub struct Buffer {
    inner: Mutex<BufferInner>,
    catalog: Catalog,
}

impl Buffer {
    /// `parent` defaults to the OS temp directory, `gigabyte_quota` defaults
    /// to 2.0, `hash_fn` defaults to a 32-character random alphanumeric
    /// generator.
    ///
    /// A non-positive `gigabyte_quota` is a programmer error, not a
    /// recoverable one: this aborts with a clear message rather than
    /// returning a `Result`. All other construction failures (an unsafe
    /// store root, an unwritable parent) surface through the returned
    /// `Result`.
    pub fn new(parent: Option<PathBuf>, gigabyte_quota: Option<f64>, hash_fn: Option<HashFn>) -> Result<Self> {
        let quota = gigabyte_quota.unwrap_or(DEFAULT_GIGABYTE_QUOTA);
        assert!(
            quota > 0.0,
            "gigabyte_quota must be positive, got {quota}"
        );

        let parent = parent.unwrap_or_else(std::env::temp_dir);
        let store = Store::new(BUFFER_NAME, &parent, quota)?;
        let catalog = Catalog::new(store.root(), INDEX_FILENAME);

        Ok(Self {
            inner: Mutex::new(BufferInner {
                store,
                hash_fn: hash_fn.unwrap_or_else(default_hash_fn),
            }),
            catalog,
        })
    }

    /// Best-effort fetch of evictable hashes: a catalog error here is
    /// swallowed (logged) and treated the same as "nothing to evict".
    fn lowest_deletable_hashes(&self) -> Vec<String> {
        self.catalog.get_lowest_deletable_hashes().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read evictable hashes, treating as none");
            Vec::new()
        })
    }

    /// `tp, device, src_path` -> `true`/`false` per `spec.md` §4.3.
    pub fn push(&self, tp: u64, device: Device, src_path: &Path) -> bool {
        let t = snap_to_minute(tp);
        let mut inner = self.inner.lock();

        if inner.store.above_quota() {
            let candidates = self.lowest_deletable_hashes();
            if candidates.is_empty() {
                debug!("store full with no evictable candidate, rejecting push");
                let _ = fs::remove_file(src_path);
                return false;
            }

            let mut evicted = Vec::new();
            for hash in candidates {
                if !inner.store.above_quota() {
                    break;
                }
                let _ = inner.store.delete(&hash);
                evicted.push(hash);
            }

            if let Err(e) = self.catalog.bulk_delete(&evicted) {
                warn!(error = %e, "failed to remove evicted rows from catalog");
            }
        }

        if !src_path.exists() || src_path.is_dir() {
            return false;
        }

        let size = match fs::metadata(src_path) {
            Ok(m) => m.len(),
            Err(_) => return false,
        };

        let hash = (inner.hash_fn)();
        let moved = inner.store.move_into(src_path, &hash).unwrap_or(false);
        if !moved {
            let _ = fs::remove_file(src_path);
            return true;
        }

        match self.catalog.insert(t, device, &hash, size, Keep::AttemptKeep) {
            Ok(InsertOutcome::Inserted) => true,
            Ok(InsertOutcome::Conflict | InsertOutcome::Rejected) | Err(_) => {
                let _ = inner.store.delete(&hash);
                true
            }
        }
    }

    /// `tp, device` -> `true`/`false` per `spec.md` §4.3.
    pub fn delete(&self, tp: u64, device: Device) -> bool {
        let t = snap_to_minute(tp);
        let mut inner = self.inner.lock();

        let hash = match self.catalog.find_hash(t, device) {
            Ok(h) if !h.is_empty() => h,
            _ => return false,
        };

        let _ = inner.store.delete(&hash);
        self.catalog.delete(&hash).is_ok()
    }

    /// The artifact's path, or an empty string if absent. Self-heals an
    /// orphaned catalog row (file removed externally) by deleting it.
    pub fn get_filepath(&self, tp: u64, device: Device) -> String {
        let t = snap_to_minute(tp);
        let mut inner = self.inner.lock();

        let hash = match self.catalog.find_hash(t, device) {
            Ok(h) => h,
            Err(_) => return String::new(),
        };
        if hash.is_empty() {
            return String::new();
        }

        let path = inner.store.get_existing_filepath(&hash);
        if path.is_empty() {
            debug!(hash, "catalog entry orphaned, self-healing");
            let _ = self.catalog.delete(&hash);
        }
        path
    }

    /// `true` if the store is over quota or free space is critically low.
    pub fn full(&self) -> bool {
        self.inner.lock().store.above_quota()
    }

    pub fn preserve_record(&self, tp: u64, device: Device) -> bool {
        self.set_keep(tp, device, Keep::PreserveRecord)
    }

    pub fn set_low_priority(&self, tp: u64, device: Device) -> bool {
        self.set_keep(tp, device, Keep::DeleteIfFull)
    }

    pub fn keep_if_possible(&self, tp: u64, device: Device) -> bool {
        self.set_keep(tp, device, Keep::AttemptKeep)
    }

    fn set_keep(&self, tp: u64, device: Device, keep: Keep) -> bool {
        let t = snap_to_minute(tp);
        let _inner = self.inner.lock();
        self.catalog.set_keep(t, device, keep).unwrap_or(false)
    }

    pub fn bulk_preserve_record(&self, tps: &[u64], device: Device) -> bool {
        self.bulk_set_keep(tps, device, Keep::PreserveRecord)
    }

    pub fn bulk_set_low_priority(&self, tps: &[u64], device: Device) -> bool {
        self.bulk_set_keep(tps, device, Keep::DeleteIfFull)
    }

    pub fn bulk_keep_if_possible(&self, tps: &[u64], device: Device) -> bool {
        self.bulk_set_keep(tps, device, Keep::AttemptKeep)
    }

    fn bulk_set_keep(&self, tps: &[u64], device: Device, keep: Keep) -> bool {
        let times: Vec<TimeValue> = tps.iter().copied().map(snap_to_minute).collect();
        let _inner = self.inner.lock();
        self.catalog.bulk_set_keep(&times, device, keep).unwrap_or(false)
    }

    /// Per-device, per-hour breakdown of every catalog row. Unlike the other
    /// public methods, a catalog error here propagates rather than being
    /// swallowed to an empty map, so callers can distinguish "empty" from
    /// "broken" (`spec.md` §9).
    pub fn get_catalog(&self) -> Result<HashMap<Device, HashMap<u64, Vec<CatalogItem>>>> {
        let _inner = self.inner.lock();
        let records = self.catalog.select_all()?;

        let mut by_device: HashMap<Device, HashMap<u64, Vec<CatalogItem>>> = HashMap::new();
        for record in records {
            let hour_bucket = record.time_value / 60;
            let minute = (record.time_value % 60) as u32;
            by_device
                .entry(record.device)
                .or_default()
                .entry(hour_bucket)
                .or_default()
                .push(CatalogItem { minute });
        }
        Ok(by_device)
    }

    pub fn get_buffer_directory(&self) -> String {
        self.inner.lock().store.get_buffer_directory()
    }
}
