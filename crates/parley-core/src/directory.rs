//! Thread directory: one direct thread per unordered pair of users.

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::db::{self, Database};
use crate::error::{Error, Result};
use crate::models::{Thread, UserId};

/// Canonical key for an unordered user pair: `"<lower>:<higher>"`.
///
/// Every place that needs a pair key must go through this function so the
/// bytes are identical regardless of argument order.
pub fn pair_key(user_a: UserId, user_b: UserId) -> String {
    let (low, high) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("{low}:{high}")
}

/// Outcome of trying to create the thread row for a pair key.
#[derive(Debug)]
pub(crate) enum Claim {
    /// This writer created the thread and both participant rows.
    Created(Thread),
    /// A thread with the same pair key already exists.
    Conflict,
}

/// Resolves or creates direct threads.
#[derive(Debug, Clone)]
pub struct ThreadDirectory {
    db: Database,
}

impl ThreadDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Return the thread for `(user_id, target_user_id)`, creating it and
    /// both participant rows when it does not exist yet. An existing thread
    /// is returned untouched.
    pub async fn ensure_direct_thread(
        &self,
        user_id: UserId,
        target_user_id: UserId,
    ) -> Result<Thread> {
        ensure_distinct(user_id, target_user_id)?;

        if let Some(thread) = self.find_direct_thread(user_id, target_user_id).await? {
            return Ok(thread);
        }

        match self.create(user_id, target_user_id).await {
            Err(Error::Conflict(reason)) => {
                warn!(%reason, "Direct thread creation conflicted, retrying as lookup");
                self.find_direct_thread(user_id, target_user_id)
                    .await?
                    .ok_or(Error::Conflict(reason))
            }
            other => other,
        }
    }

    /// Look up the thread for a pair without creating it.
    pub async fn find_direct_thread(
        &self,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Option<Thread>> {
        db::fetch_thread_by_key(self.db.pool(), &pair_key(user_a, user_b)).await
    }

    async fn create(&self, user_id: UserId, target_user_id: UserId) -> Result<Thread> {
        let mut tx = self.db.pool().begin().await?;
        let thread = resolve_thread(&mut *tx, user_id, target_user_id).await?;
        tx.commit().await?;
        Ok(thread)
    }
}

/// Self-addressed conversations are not supported.
pub(crate) fn ensure_distinct(user_id: UserId, target_user_id: UserId) -> Result<()> {
    if user_id == target_user_id {
        return Err(Error::InvalidArgument(
            "cannot start a conversation with yourself".to_string(),
        ));
    }
    Ok(())
}

/// Resolve the pair's thread inside an open transaction, creating it when
/// absent. The claim insert runs first so the transaction holds the write
/// lock before it reads anything.
pub(crate) async fn resolve_thread(
    conn: &mut SqliteConnection,
    user_id: UserId,
    target_user_id: UserId,
) -> Result<Thread> {
    let direct_key = pair_key(user_id, target_user_id);
    match claim_thread(conn, &direct_key, user_id, target_user_id).await? {
        Claim::Created(thread) => Ok(thread),
        Claim::Conflict => db::fetch_thread_by_key(&mut *conn, &direct_key)
            .await?
            .ok_or(Error::Conflict(direct_key)),
    }
}

pub(crate) async fn claim_thread(
    conn: &mut SqliteConnection,
    direct_key: &str,
    user_id: UserId,
    target_user_id: UserId,
) -> Result<Claim> {
    let now = db::now();
    let ts = db::to_micros(now);

    let result = sqlx::query(
        r#"
        INSERT INTO message_threads (created_by_user_id, direct_key, created_at, updated_at, latest_message_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(direct_key) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(direct_key)
    .bind(ts)
    .bind(ts)
    .bind(ts)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(Claim::Conflict);
    }
    let thread_id = result.last_insert_rowid();

    // The initiator has implicitly seen the (empty) thread.
    sqlx::query(
        r#"
        INSERT INTO message_participants (thread_id, user_id, joined_at, last_read_at, unread_count)
        VALUES (?, ?, ?, ?, 0), (?, ?, ?, NULL, 0)
        "#,
    )
    .bind(thread_id)
    .bind(user_id)
    .bind(ts)
    .bind(ts)
    .bind(thread_id)
    .bind(target_user_id)
    .bind(ts)
    .execute(&mut *conn)
    .await?;

    debug!(thread_id, "Created direct thread");

    Ok(Claim::Created(Thread {
        id: thread_id,
        created_by_user_id: user_id,
        direct_key: direct_key.to_string(),
        created_at: now,
        updated_at: now,
        latest_message_at: now,
    }))
}
