//! Common types used throughout the indexed buffer

use std::fmt;

/// Retention class for a catalog entry.
///
/// The numeric ordering matters: lower values are evicted first. This is
/// expressed as a sum type rather than raw integers so no call site has to
/// reason about magic numbers; [`Keep::priority`] is the single place the
/// ordering is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Keep {
    /// Evictable first.
    DeleteIfFull,
    /// Evictable only if no `DeleteIfFull` candidate exists.
    AttemptKeep,
    /// Never evictable.
    PreserveRecord,
}

impl Keep {
    /// Numeric priority matching the original schema's `keep` column.
    pub const fn priority(self) -> u32 {
        match self {
            Keep::DeleteIfFull => 0,
            Keep::AttemptKeep => 10,
            Keep::PreserveRecord => 1000,
        }
    }

    pub(crate) const fn from_priority(value: u32) -> Option<Self> {
        match value {
            0 => Some(Keep::DeleteIfFull),
            10 => Some(Keep::AttemptKeep),
            1000 => Some(Keep::PreserveRecord),
            _ => None,
        }
    }
}

impl fmt::Display for Keep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keep::DeleteIfFull => write!(f, "DELETE_IF_FULL"),
            Keep::AttemptKeep => write!(f, "ATTEMPT_KEEP"),
            Keep::PreserveRecord => write!(f, "PRESERVE_RECORD"),
        }
    }
}

/// Canonical minute-resolution time key, produced by [`crate::time::snap_to_minute`].
pub type TimeValue = u64;

/// Caller-chosen logical device identifier.
pub type Device = u32;

/// A single catalog row, as returned by `Catalog::select_all`.
#[derive(Debug, Clone)]
pub struct CatalogRecord {
    pub time_value: TimeValue,
    pub device: Device,
    pub hash: String,
    pub size: u64,
    pub keep: Keep,
}

/// One entry in the per-device, per-hour breakdown produced by
/// `Buffer::get_catalog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogItem {
    /// Minute-of-hour, in `0..60`.
    pub minute: u32,
}
