use crate::{normalized_key, ReportStore, StoredReport};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use subpulse_core::{AnalysisReport, CoreError, DatabaseError};
use tracing::{debug, info};

const CREATE_ANALYTICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS subreddit_analytics (
    name TEXT PRIMARY KEY NOT NULL,
    display_name TEXT NOT NULL,
    analysis_results TEXT NOT NULL,
    post_count INTEGER NOT NULL,
    last_updated TEXT NOT NULL
)
"#;

const UPSERT_REPORT: &str = r#"
INSERT INTO subreddit_analytics (name, display_name, analysis_results, post_count, last_updated)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(name) DO UPDATE SET
    display_name = excluded.display_name,
    analysis_results = excluded.analysis_results,
    post_count = excluded.post_count,
    last_updated = excluded.last_updated
"#;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// SQLITE_BUSY and SQLITE_LOCKED; extended codes keep the primary code in the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Maps lock contention to [`DatabaseError::DatabaseLocked`] so callers can
/// retry it; everything else stays a plain SQL error.
fn sql_error(error: sqlx::Error) -> DatabaseError {
    let locked = error
        .as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false);

    if locked {
        DatabaseError::DatabaseLocked
    } else {
        DatabaseError::Sql(error)
    }
}

const SELECT_REPORT: &str = r#"
SELECT analysis_results, last_updated FROM subreddit_analytics WHERE name = ?1
"#;

/// Reports stored as JSON in a single SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteReportStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteReportStore {
    /// Opens (creating if needed) the database at `database_url` and makes
    /// sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        Self::connect_with_busy_timeout(database_url, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Like [`connect`](Self::connect), but waits at most `busy_timeout` for
    /// a lock held by another connection before failing with
    /// [`DatabaseError::DatabaseLocked`].
    pub async fn connect_with_busy_timeout(
        database_url: &str,
        busy_timeout: Duration,
    ) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Connected to report store at {}", database_url);
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::query(CREATE_ANALYTICS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: format!("create subreddit_analytics: {}", e),
            })?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl ReportStore for SqliteReportStore {
    async fn get(&self, name: &str) -> Result<Option<StoredReport>, CoreError> {
        let key = normalized_key(name)?;
        let row = sqlx::query(SELECT_REPORT)
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_error)?;

        let Some(row) = row else {
            debug!("No stored report for {}", key);
            return Ok(None);
        };

        let json: String = row
            .try_get("analysis_results")
            .map_err(DatabaseError::from)?;
        let report: AnalysisReport = serde_json::from_str(&json)
            .map_err(|_| DatabaseError::CorruptRecord { key: key.clone() })?;
        let last_updated: DateTime<Utc> =
            row.try_get("last_updated").map_err(DatabaseError::from)?;

        Ok(Some(StoredReport {
            report,
            last_updated,
        }))
    }

    async fn put(&self, name: &str, report: &AnalysisReport) -> Result<(), CoreError> {
        let key = normalized_key(name)?;
        let json = serde_json::to_string(report)?;

        sqlx::query(UPSERT_REPORT)
            .bind(&key)
            .bind(&report.display_name)
            .bind(json)
            .bind(report.post_count as i64)
            .bind(report.computed_at)
            .execute(&self.pool)
            .await
            .map_err(sql_error)?;

        debug!("Stored report for {} ({} posts)", key, report.post_count);
        Ok(())
    }
}
