//! parley-core: direct messaging between pairs of users
//!
//! This crate owns the durable conversation state for two-party chats:
//! the thread directory that maps an unordered user pair to one thread,
//! the message ledger that appends messages and fans out unread counts,
//! and the read-side conversation view with participant-gated access.

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod messenger;
pub mod models;
pub mod schema;
pub mod view;

pub use config::Config;
pub use db::Database;
pub use directory::{ThreadDirectory, pair_key};
pub use error::Error;
pub use error::Result;
pub use ledger::MessageLedger;
pub use messenger::Messenger;
pub use view::ConversationView;

/// Application name used for config directories and paths.
pub const APP_NAME: &str = "parley";

/// Returns the environment variable prefix for this application.
pub fn env_prefix() -> String {
    "PARLEY".to_string()
}
