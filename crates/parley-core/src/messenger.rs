//! Facade composing the directory, ledger and view over one store handle.

use crate::db::Database;
use crate::directory::ThreadDirectory;
use crate::error::Result;
use crate::ledger::MessageLedger;
use crate::models::{SentMessage, Thread, ThreadDetail, ThreadId, ThreadSummary, UserId};
use crate::view::ConversationView;

/// Entry point for callers that act on behalf of an authenticated user.
#[derive(Debug, Clone)]
pub struct Messenger {
    db: Database,
    directory: ThreadDirectory,
    ledger: MessageLedger,
    view: ConversationView,
}

impl Messenger {
    pub fn new(db: Database) -> Self {
        Self {
            directory: ThreadDirectory::new(db.clone()),
            ledger: MessageLedger::new(db.clone()),
            view: ConversationView::new(db.clone()),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn directory(&self) -> &ThreadDirectory {
        &self.directory
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub async fn ensure_direct_thread(&self, user_id: UserId, target_user_id: UserId) -> Result<Thread> {
        self.directory
            .ensure_direct_thread(user_id, target_user_id)
            .await
    }

    pub async fn send_direct_message(
        &self,
        sender_id: UserId,
        recipient_id: UserId,
        body: &str,
    ) -> Result<SentMessage> {
        self.ledger
            .send_direct_message(sender_id, recipient_id, body)
            .await
    }

    pub async fn list_threads_for_user(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<ThreadSummary>> {
        self.view.list_threads_for_user(user_id, limit).await
    }

    pub async fn load_thread_for_user(
        &self,
        user_id: UserId,
        thread_id: ThreadId,
    ) -> Result<Option<ThreadDetail>> {
        self.view.load_thread_for_user(user_id, thread_id).await
    }

    pub async fn mark_thread_read(&self, user_id: UserId, thread_id: ThreadId) -> Result<bool> {
        self.view.mark_thread_read(user_id, thread_id).await
    }

    pub async fn unread_total(&self, user_id: UserId) -> Result<i64> {
        self.view.unread_total(user_id).await
    }
}
