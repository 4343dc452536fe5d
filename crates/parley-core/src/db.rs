//! Database handle and row mapping for parley.

use crate::error::Result;
use crate::models::{Message, Participant, Thread, ThreadId};
use crate::schema::SCHEMA;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// Error type of the underlying store driver.
pub use sqlx::Error as StoreError;

/// Database handle for parley.
///
/// Cloning is cheap and shares the underlying pool; every component is
/// constructed with its own clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init().await?;
        tracing::info!("Messaging database opened at {}", path.display());
        Ok(db)
    }

    /// Initialize schema.
    async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database.
    pub async fn close(self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Get thread count.
    pub async fn count_threads(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM message_threads")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Get participant count.
    pub async fn count_participants(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM message_participants")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Get message count.
    pub async fn count_messages(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

// =============================================================================
// Shared lookups
// =============================================================================

pub(crate) async fn fetch_thread_by_key<'e, E>(executor: E, direct_key: &str) -> Result<Option<Thread>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM message_threads WHERE direct_key = ?")
        .bind(direct_key)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(thread_from_row).transpose()
}

pub(crate) async fn fetch_thread<'e, E>(executor: E, id: ThreadId) -> Result<Option<Thread>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM message_threads WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(thread_from_row).transpose()
}

pub(crate) async fn fetch_participants<'e, E>(executor: E, thread_id: ThreadId) -> Result<Vec<Participant>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT * FROM message_participants WHERE thread_id = ? ORDER BY id")
        .bind(thread_id)
        .fetch_all(executor)
        .await?;

    rows.iter().map(participant_from_row).collect()
}

// =============================================================================
// Row mapping
// =============================================================================

/// Current time at the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn to_micros(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

pub(crate) fn thread_from_row(row: &SqliteRow) -> Result<Thread> {
    Ok(Thread {
        id: row.try_get("id")?,
        created_by_user_id: row.try_get("created_by_user_id")?,
        direct_key: row.try_get("direct_key")?,
        created_at: from_micros(row.try_get("created_at")?),
        updated_at: from_micros(row.try_get("updated_at")?),
        latest_message_at: from_micros(row.try_get("latest_message_at")?),
    })
}

pub(crate) fn participant_from_row(row: &SqliteRow) -> Result<Participant> {
    Ok(Participant {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        user_id: row.try_get("user_id")?,
        joined_at: from_micros(row.try_get("joined_at")?),
        last_read_at: row
            .try_get::<Option<i64>, _>("last_read_at")?
            .map(from_micros),
        unread_count: row.try_get("unread_count")?,
    })
}

pub(crate) fn message_from_row(row: &SqliteRow) -> Result<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        sender_user_id: row.try_get("sender_user_id")?,
        body: row.try_get("body")?,
        created_at: from_micros(row.try_get("created_at")?),
    })
}

/// `?, ?, ?` with one placeholder per item, for `IN (...)` clauses.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_roundtrip_preserves_truncated_now() {
        let ts = now();
        assert_eq!(from_micros(to_micros(ts)), ts);
    }

    #[test]
    fn placeholders_match_count() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
