//! Durable decision log on SQLite.
//!
//! `decisions` holds one row per request id (enforced by a UNIQUE
//! constraint). `feedback_events` is append-only history; the latest
//! feedback is also copied onto the decision row.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use luma_core::decisions::{DecisionRecord, FeedbackEvent, LogEntry};

pub const DEFAULT_LOG_LIMIT: i64 = 50;
pub const MAX_LOG_LIMIT: i64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a decision with request_id '{0}' already exists")]
    DuplicateRequestId(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct DecisionStore {
    pool: SqlitePool,
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct DecisionRow {
    request_id: String,
    context_json: String,
    action_json: String,
    gateway_json: String,
    policy_version: String,
    model_version: Option<String>,
    latency_ms: i64,
    user_feedback: Option<String>,
    created_at: String,
}

impl DecisionRow {
    fn into_log_entry(self) -> LogEntry {
        LogEntry {
            created_at: parse_timestamp(&self.created_at, &self.request_id),
            context: decode_blob(self.context_json),
            action: decode_blob(self.action_json),
            gateway: decode_blob(self.gateway_json),
            request_id: self.request_id,
            policy_version: self.policy_version,
            model_version: self.model_version,
            latency_ms: self.latency_ms,
            user_feedback: self.user_feedback,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    request_id: String,
    feedback: String,
    created_at: String,
}

impl DecisionStore {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database. A single connection is kept alive for the
    /// lifetime of the pool so the data survives between queries.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("../migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a decision. Fails with `DuplicateRequestId` if the id is
    /// already taken; the existing row is left untouched.
    pub async fn insert_decision(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        let context_json = serde_json::to_string(&record.context)?;
        let action_json = serde_json::to_string(&record.action)?;
        let gateway_json = serde_json::to_string(&record.gateway)?;

        sqlx::query(
            r#"
            INSERT INTO decisions
                (request_id, context_json, action_json, gateway_json, policy_version,
                 model_version, latency_ms, user_feedback, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.request_id)
        .bind(&context_json)
        .bind(&action_json)
        .bind(&gateway_json)
        .bind(&record.policy_version)
        .bind(record.model_version.as_deref())
        .bind(record.latency_ms)
        .bind(record.user_feedback.as_deref())
        .bind(format_timestamp(record.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return StoreError::DuplicateRequestId(record.request_id.clone());
                }
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    /// Attach feedback to a decision and append it to the feedback history.
    ///
    /// The two writes are independent. Feedback for an unknown request id
    /// updates nothing but is still appended. Returns whether a decision row
    /// was updated.
    pub async fn record_feedback(
        &self,
        request_id: &str,
        feedback: &str,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query("UPDATE decisions SET user_feedback = ? WHERE request_id = ?")
            .bind(feedback)
            .bind(request_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        sqlx::query(
            "INSERT INTO feedback_events (request_id, feedback, created_at) VALUES (?, ?, ?)",
        )
        .bind(request_id)
        .bind(feedback)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(updated > 0)
    }

    /// Newest decisions first. `limit <= 0` means the default of 50.
    pub async fn list_logs(&self, limit: i64) -> Result<Vec<LogEntry>, StoreError> {
        let limit = effective_limit(limit);

        let rows = sqlx::query_as::<_, DecisionRow>(
            r#"
            SELECT request_id, context_json, action_json, gateway_json, policy_version,
                   model_version, latency_ms, user_feedback, created_at
            FROM decisions
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DecisionRow::into_log_entry).collect())
    }

    /// Feedback history for one request id, oldest first.
    pub async fn feedback_history(
        &self,
        request_id: &str,
    ) -> Result<Vec<FeedbackEvent>, StoreError> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            "SELECT request_id, feedback, created_at FROM feedback_events \
             WHERE request_id = ? ORDER BY id ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FeedbackEvent {
                created_at: parse_timestamp(&row.created_at, &row.request_id),
                request_id: row.request_id,
                feedback: row.feedback,
            })
            .collect())
    }
}

fn effective_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_LOG_LIMIT
    } else {
        limit.min(MAX_LOG_LIMIT)
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// A corrupt timestamp degrades to "now" instead of failing the query.
fn parse_timestamp(raw: &str, request_id: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(err) => {
            tracing::warn!(
                request_id,
                raw,
                error = %err,
                "unparseable created_at, substituting now"
            );
            Utc::now()
        }
    }
}

/// Stored JSON that no longer decodes is returned as a JSON string.
fn decode_blob(raw: String) -> serde_json::Value {
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
}
