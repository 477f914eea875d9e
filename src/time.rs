//! Canonicalization of wall-clock instants to whole-minute buckets

use crate::types::TimeValue;

/// Snap a millisecond-resolution wall-clock instant to the nearest whole
/// minute.
///
/// The boundary is closed below: `m mod 60_000 < 30_000` rounds down,
/// `m mod 60_000 >= 30_000` rounds up. This is a total, deterministic
/// function — the same `m` always yields the same [`TimeValue`].
pub fn snap_to_minute(millis_since_epoch: u64) -> TimeValue {
    let minute = millis_since_epoch / 60_000;
    let remainder = millis_since_epoch % 60_000;
    if remainder < 30_000 { minute } else { minute + 1 }
}
