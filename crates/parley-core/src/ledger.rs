//! Message ledger: appends messages and fans out unread state.

use tracing::{debug, warn};

use crate::db::{self, Database};
use crate::directory::{self, resolve_thread};
use crate::error::{Error, Result};
use crate::models::{Message, SentMessage, Thread, UserId};

/// Longest accepted message body, in characters after trimming.
pub const MAX_BODY_CHARS: usize = 4000;

/// Trim a message body and check it is within bounds.
pub fn normalize_body(body: &str) -> Result<&str> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("message body required".to_string()));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_BODY_CHARS {
        return Err(Error::InvalidArgument(format!(
            "message body is {chars} characters, limit is {MAX_BODY_CHARS}"
        )));
    }
    Ok(trimmed)
}

/// Appends direct messages.
#[derive(Debug, Clone)]
pub struct MessageLedger {
    db: Database,
}

impl MessageLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Send `body` from `sender_id` to `recipient_id`, creating their thread
    /// on first contact.
    ///
    /// The message insert, both participant updates and the thread
    /// timestamp bump commit together or not at all. Input is validated
    /// before the store is touched.
    pub async fn send_direct_message(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        body: &str,
    ) -> Result<SentMessage> {
        let body = normalize_body(body)?;
        directory::ensure_distinct(sender_id, recipient_id)?;

        match self.append(sender_id, recipient_id, body).await {
            Err(Error::Conflict(reason)) => {
                warn!(%reason, "Message append conflicted, retrying once");
                self.append(sender_id, recipient_id, body).await
            }
            other => other,
        }
    }

    async fn append(&self, sender_id: UserId, recipient_id: UserId, body: &str) -> Result<SentMessage> {
        let mut tx = self.db.pool().begin().await?;
        let thread = resolve_thread(&mut *tx, sender_id, recipient_id).await?;

        // Taken after the thread claim so it cannot predate a message
        // committed by a writer we waited on.
        let created_at = db::now();
        let ts = db::to_micros(created_at);

        let message_id = sqlx::query(
            "INSERT INTO messages (thread_id, sender_user_id, body, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(thread.id)
        .bind(sender_id)
        .bind(body)
        .bind(ts)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        // Sending implies having read up to one's own message.
        sqlx::query(
            "UPDATE message_participants SET last_read_at = ?, unread_count = 0 WHERE thread_id = ? AND user_id = ?",
        )
        .bind(ts)
        .bind(thread.id)
        .bind(sender_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE message_participants SET unread_count = unread_count + 1 WHERE thread_id = ? AND user_id != ?",
        )
        .bind(thread.id)
        .bind(sender_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE message_threads SET updated_at = ?, latest_message_at = ? WHERE id = ?")
            .bind(ts)
            .bind(ts)
            .bind(thread.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(thread_id = thread.id, message_id, "Appended direct message");

        Ok(SentMessage {
            message: Message {
                id: message_id,
                thread_id: thread.id,
                sender_user_id: sender_id,
                body: body.to_string(),
                created_at,
            },
            thread: Thread {
                updated_at: created_at,
                latest_message_at: created_at,
                ..thread
            },
        })
    }
}
