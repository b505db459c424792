//! Shared database time conversion helpers.

use chrono::{DateTime, Utc};

/// Index key for an expiry deadline.
///
/// Pre-epoch timestamps clamp to zero so ordering stays total without
/// negative-to-unsigned underflow.
pub(super) fn expiry_index_key(deadline: DateTime<Utc>) -> u64 {
    deadline.timestamp_millis().max(0) as u64
}
