//! Decides whether a cached analysis can be reused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cadence of the fetch-and-persist workflow.
pub const REFETCH_THRESHOLD_SECS: i64 = 24 * 60 * 60;

/// Cadence of the dashboard auto refresh.
pub const AUTO_REFRESH_THRESHOLD_SECS: i64 = 30 * 60;

/// A missing timestamp is always stale. Otherwise the result is stale once
/// strictly more than `threshold_secs` have elapsed.
pub fn is_stale(
    last_computed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_secs: i64,
) -> bool {
    match last_computed_at {
        None => true,
        Some(last) => (now - last).num_seconds() > threshold_secs,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    pub threshold_secs: i64,
}

impl FreshnessPolicy {
    pub fn new(threshold_secs: i64) -> Self {
        Self { threshold_secs }
    }

    pub fn refetch() -> Self {
        Self::new(REFETCH_THRESHOLD_SECS)
    }

    pub fn auto_refresh() -> Self {
        Self::new(AUTO_REFRESH_THRESHOLD_SECS)
    }

    pub fn is_stale(&self, last_computed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        is_stale(last_computed_at, now, self.threshold_secs)
    }
}
