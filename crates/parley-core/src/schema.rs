//! Database schema for parley.

/// SQL schema for the messaging store.
///
/// Timestamps are INTEGER microseconds since the Unix epoch (UTC).
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS message_threads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_by_user_id INTEGER NOT NULL,
    direct_key TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    latest_message_at INTEGER NOT NULL,
    CONSTRAINT uq_message_threads_direct_key UNIQUE (direct_key)
);

CREATE INDEX IF NOT EXISTS idx_message_threads_latest
    ON message_threads(latest_message_at);
CREATE INDEX IF NOT EXISTS idx_message_threads_created_by
    ON message_threads(created_by_user_id);

CREATE TABLE IF NOT EXISTS message_participants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id INTEGER NOT NULL REFERENCES message_threads(id),
    user_id INTEGER NOT NULL,
    joined_at INTEGER NOT NULL,
    last_read_at INTEGER,
    unread_count INTEGER NOT NULL DEFAULT 0 CHECK (unread_count >= 0),
    CONSTRAINT uq_message_participants_thread_user UNIQUE (thread_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_message_participants_thread
    ON message_participants(thread_id);
CREATE INDEX IF NOT EXISTS idx_message_participants_user
    ON message_participants(user_id);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id INTEGER NOT NULL REFERENCES message_threads(id),
    sender_user_id INTEGER NOT NULL,
    body TEXT NOT NULL CHECK (length(body) BETWEEN 1 AND 4000),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_thread_created
    ON messages(thread_id, created_at);
CREATE INDEX IF NOT EXISTS idx_messages_sender
    ON messages(sender_user_id);
"#;
