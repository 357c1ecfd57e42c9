use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use subpulse_core::{AnalysisReport, CoreError};

mod memory;
mod sqlite;


pub use memory::MemoryReportStore;
pub use sqlite::SqliteReportStore;

/// A persisted report together with the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    pub report: AnalysisReport,
    pub last_updated: DateTime<Utc>,
}

/// Report persistence keyed by subreddit. Keys are normalized with
/// [`subpulse_core::subreddit_key`], so `RustLang` and `rustlang` share a row.
pub trait ReportStore: Send + Sync {
    fn get(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<StoredReport>, CoreError>> + Send;

    /// Replaces any previous report for `name`. `last_updated` is taken from
    /// the report's `computed_at`.
    fn put(
        &self,
        name: &str,
        report: &AnalysisReport,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

fn normalized_key(name: &str) -> Result<String, CoreError> {
    let key = subpulse_core::subreddit_key(name);
    if key.is_empty() {
        return Err(CoreError::invalid_input("subreddit name must not be empty"));
    }
    Ok(key)
}
