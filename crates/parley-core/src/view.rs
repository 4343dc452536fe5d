//! Conversation view: participant-gated reads and read acknowledgements.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use tracing::debug;

use crate::db::{self, Database};
use crate::error::Result;
use crate::models::{Message, Participant, ThreadDetail, ThreadId, ThreadSummary, UserId};

/// Inbox page size when the caller does not specify one.
pub const DEFAULT_THREAD_LIMIT: i64 = 50;

/// Read-side access to a user's conversations.
#[derive(Debug, Clone)]
pub struct ConversationView {
    db: Database,
}

impl ConversationView {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Threads `user_id` participates in, most recently active first.
    ///
    /// Participants and last messages are fetched with one query each for
    /// the whole page, all inside a single read snapshot.
    pub async fn list_threads_for_user(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<ThreadSummary>> {
        let limit = limit.unwrap_or(DEFAULT_THREAD_LIMIT).max(0);
        let mut tx = self.db.pool().begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT t.* FROM message_threads t
            JOIN message_participants p ON p.thread_id = t.id
            WHERE p.user_id = ?
            ORDER BY t.latest_message_at DESC, t.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let threads = rows
            .iter()
            .map(db::thread_from_row)
            .collect::<Result<Vec<_>>>()?;
        if threads.is_empty() {
            return Ok(Vec::new());
        }

        let thread_ids: Vec<ThreadId> = threads.iter().map(|t| t.id).collect();
        let mut participants = group_participants(fetch_participants_in(&mut tx, &thread_ids).await?);
        let mut last_messages = fetch_last_messages_in(&mut tx, &thread_ids).await?;
        tx.commit().await?;

        Ok(threads
            .into_iter()
            .map(|thread| ThreadSummary {
                participants: participants.remove(&thread.id).unwrap_or_default(),
                last_message: last_messages.remove(&thread.id),
                thread,
            })
            .collect())
    }

    /// Full thread contents for a participant.
    ///
    /// Returns `None` both when the thread does not exist and when
    /// `user_id` is not one of its participants.
    pub async fn load_thread_for_user(
        &self,
        user_id: UserId,
        thread_id: ThreadId,
    ) -> Result<Option<ThreadDetail>> {
        let mut tx = self.db.pool().begin().await?;

        let Some(viewer) = fetch_participant(&mut tx, thread_id, user_id).await? else {
            return Ok(None);
        };
        let Some(thread) = db::fetch_thread(&mut *tx, thread_id).await? else {
            return Ok(None);
        };
        let participants = db::fetch_participants(&mut *tx, thread_id).await?;

        let rows = sqlx::query("SELECT * FROM messages WHERE thread_id = ? ORDER BY created_at ASC, id ASC")
            .bind(thread_id)
            .fetch_all(&mut *tx)
            .await?;
        let messages = rows
            .iter()
            .map(db::message_from_row)
            .collect::<Result<Vec<_>>>()?;
        tx.commit().await?;

        Ok(Some(ThreadDetail {
            thread,
            participants,
            messages,
            viewer,
        }))
    }

    /// Acknowledge everything in the thread as read by `user_id`.
    ///
    /// Returns `false` when `user_id` is not a participant (or the thread
    /// does not exist). Repeating the call only refreshes `last_read_at`.
    pub async fn mark_thread_read(&self, user_id: UserId, thread_id: ThreadId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE message_participants SET last_read_at = ?, unread_count = 0 WHERE thread_id = ? AND user_id = ?",
        )
        .bind(db::to_micros(db::now()))
        .bind(thread_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            debug!(thread_id, "Marked thread read");
        }
        Ok(updated)
    }

    /// Sum of unread counts across every thread of `user_id`.
    pub async fn unread_total(&self, user_id: UserId) -> Result<i64> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(unread_count), 0) FROM message_participants WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(total.0)
    }
}

/// Group participant rows by thread, keeping their input order.
pub fn group_participants(rows: Vec<Participant>) -> HashMap<ThreadId, Vec<Participant>> {
    let mut grouped: HashMap<ThreadId, Vec<Participant>> = HashMap::new();
    for participant in rows {
        grouped
            .entry(participant.thread_id)
            .or_default()
            .push(participant);
    }
    grouped
}

async fn fetch_participant(
    conn: &mut SqliteConnection,
    thread_id: ThreadId,
    user_id: UserId,
) -> Result<Option<Participant>> {
    let row = sqlx::query("SELECT * FROM message_participants WHERE thread_id = ? AND user_id = ?")
        .bind(thread_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(db::participant_from_row).transpose()
}

async fn fetch_participants_in(
    conn: &mut SqliteConnection,
    thread_ids: &[ThreadId],
) -> Result<Vec<Participant>> {
    let sql = format!(
        "SELECT * FROM message_participants WHERE thread_id IN ({}) ORDER BY thread_id, id",
        db::placeholders(thread_ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in thread_ids {
        query = query.bind(*id);
    }

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(db::participant_from_row).collect()
}

async fn fetch_last_messages_in(
    conn: &mut SqliteConnection,
    thread_ids: &[ThreadId],
) -> Result<HashMap<ThreadId, Message>> {
    let sql = format!(
        r#"
        SELECT id, thread_id, sender_user_id, body, created_at FROM (
            SELECT m.*, ROW_NUMBER() OVER (
                PARTITION BY m.thread_id ORDER BY m.created_at DESC, m.id DESC
            ) AS rn
            FROM messages m
            WHERE m.thread_id IN ({})
        )
        WHERE rn = 1
        "#,
        db::placeholders(thread_ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in thread_ids {
        query = query.bind(*id);
    }

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| db::message_from_row(row).map(|m| (m.thread_id, m)))
        .collect()
}
