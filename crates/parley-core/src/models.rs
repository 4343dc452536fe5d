//! Domain models for direct-messaging entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an already-authenticated user, supplied by the caller.
pub type UserId = i64;

/// Identifier of a direct thread.
pub type ThreadId = i64;

/// A direct conversation between exactly two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub created_by_user_id: UserId,
    /// Canonical encoding of the participant pair, see [`crate::pair_key`].
    pub direct_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub latest_message_at: DateTime<Utc>,
}

/// One user's membership and read state within a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub thread_id: ThreadId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
}

impl Participant {
    /// Derived read status; never stored.
    pub fn read_state(&self) -> ReadState {
        if self.unread_count > 0 {
            ReadState::Unread(self.unread_count)
        } else {
            ReadState::Read
        }
    }
}

/// Read status of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "count")]
pub enum ReadState {
    Unread(i64),
    Read,
}

impl std::fmt::Display for ReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadState::Unread(count) => write!(f, "unread ({count})"),
            ReadState::Read => write!(f, "read"),
        }
    }
}

/// A chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub thread_id: ThreadId,
    pub sender_user_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Result of sending a message: the stored message and its thread as of
/// the same commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub message: Message,
    pub thread: Thread,
}

/// Inbox entry for one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    #[serde(flatten)]
    pub thread: Thread,
    pub participants: Vec<Participant>,
    pub last_message: Option<Message>,
}

impl ThreadSummary {
    /// The participant row belonging to `user_id`, if any.
    pub fn participant(&self, user_id: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }
}

/// Full thread contents as seen by one participant (the viewer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: Thread,
    pub participants: Vec<Participant>,
    /// Oldest first.
    pub messages: Vec<Message>,
    pub viewer: Participant,
}

impl ThreadDetail {
    /// The other side of the conversation.
    pub fn counterpart(&self) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.user_id != self.viewer.user_id)
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
