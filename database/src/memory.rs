use crate::{normalized_key, ReportStore, StoredReport};
use std::collections::HashMap;
use subpulse_core::{AnalysisReport, CoreError};
use tokio::sync::RwLock;

/// Process-local store, used by tests and `--memory` runs.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<String, StoredReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }
}

impl ReportStore for MemoryReportStore {
    async fn get(&self, name: &str) -> Result<Option<StoredReport>, CoreError> {
        let key = normalized_key(name)?;
        Ok(self.reports.read().await.get(&key).cloned())
    }

    async fn put(&self, name: &str, report: &AnalysisReport) -> Result<(), CoreError> {
        let key = normalized_key(name)?;
        let stored = StoredReport {
            report: report.clone(),
            last_updated: report.computed_at,
        };
        self.reports.write().await.insert(key, stored);
        Ok(())
    }
}
