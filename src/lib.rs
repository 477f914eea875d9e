//! An indexed, quota-bounded on-disk buffer for per-device, per-minute
//! binary artifacts.
//!
//! This crate coordinates three subsystems behind a single public façade,
//! [`Buffer`]:
//!
//! - [`store`] — a content-addressed store over a local directory tree,
//!   with size accounting, quota enforcement, and atomic ingest.
//! - [`catalog`] — a small relational index mapping `(time, device)` to a
//!   content hash, carrying a per-record retention class.
//! - [`Buffer`] — the façade tying the two together: serialization,
//!   eviction policy, time-snapping, and orphan self-healing.

mod buffer;
pub mod catalog;
mod error;
mod hash;
pub mod store;
mod time;
mod types;

pub use buffer::Buffer;
pub use catalog::Catalog;
pub use error::{BufferError, CatalogError, Result};
pub use hash::{HashFn, default_hash_fn};
pub use store::Store;
pub use time::snap_to_minute;
pub use types::{CatalogItem, CatalogRecord, Device, Keep, TimeValue};
