//! parley CLI - direct messaging from the terminal

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parley_core::models::{ThreadDetail, ThreadSummary, UserId};
use parley_core::{Config, Database, Messenger};

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    author,
    version,
    about = "Direct messaging threads between pairs of users",
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this (already authenticated) user
    #[arg(long = "as", value_name = "USER_ID", env = "PARLEY_USER", global = true)]
    user: Option<UserId>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or upgrade the messaging database
    Init,

    /// Open (or find) the direct thread with another user
    Start {
        /// Other user's ID
        target: UserId,
    },

    /// Send a direct message
    Send {
        /// Recipient user ID
        recipient: UserId,

        /// Message text
        body: String,
    },

    /// List your threads, most recent first
    Inbox {
        /// Maximum threads
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Show a thread's messages
    Show {
        /// Thread ID
        thread: i64,
    },

    /// Mark a thread as read
    Read {
        /// Thread ID
        thread: i64,
    },

    /// Show database statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;

    // Open database
    let db = Database::open(&config.database).await?;
    let messenger = Messenger::new(db);
    let user = cli.user;
    let json = cli.json;

    match cli.command {
        Command::Init => {
            println!("Messaging database ready at {}", config.database.display());
            Ok(())
        }
        Command::Start { target } => cmd_start(&messenger, acting(user)?, target, json).await,
        Command::Send { recipient, body } => {
            cmd_send(&messenger, acting(user)?, recipient, &body, json).await
        }
        Command::Inbox { limit } => {
            let limit = config.thread_limit(limit);
            cmd_inbox(&messenger, acting(user)?, limit, json).await
        }
        Command::Show { thread } => cmd_show(&messenger, acting(user)?, thread, json).await,
        Command::Read { thread } => cmd_read(&messenger, acting(user)?, thread).await,
        Command::Stats => cmd_stats(messenger.database()).await,
    }
}

fn acting(user: Option<UserId>) -> Result<UserId> {
    user.context("this command needs an identity; pass --as <USER_ID> or set PARLEY_USER")
}

async fn cmd_start(messenger: &Messenger, user: UserId, target: UserId, json: bool) -> Result<()> {
    let thread = messenger.ensure_direct_thread(user, target).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&thread)?);
    } else {
        println!("Thread {} with user {}", thread.id, target);
    }
    Ok(())
}

async fn cmd_send(
    messenger: &Messenger,
    user: UserId,
    recipient: UserId,
    body: &str,
    json: bool,
) -> Result<()> {
    let sent = messenger.send_direct_message(user, recipient, body).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&sent)?);
    } else {
        println!(
            "Sent message {} in thread {}",
            sent.message.id, sent.thread.id
        );
    }
    Ok(())
}

async fn cmd_inbox(messenger: &Messenger, user: UserId, limit: i64, json: bool) -> Result<()> {
    let summaries = messenger.list_threads_for_user(user, Some(limit)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }

    for summary in &summaries {
        println!("{}", format_summary(summary, user));
    }

    let total = messenger.unread_total(user).await?;
    println!();
    println!("Unread: {total}");
    Ok(())
}

async fn cmd_show(messenger: &Messenger, user: UserId, thread: i64, json: bool) -> Result<()> {
    let detail = messenger
        .load_thread_for_user(user, thread)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Thread not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print_detail(&detail);
    }
    Ok(())
}

async fn cmd_read(messenger: &Messenger, user: UserId, thread: i64) -> Result<()> {
    if messenger.mark_thread_read(user, thread).await? {
        println!("Marked thread {thread} as read");
        Ok(())
    } else {
        anyhow::bail!("Thread not found")
    }
}

async fn cmd_stats(db: &Database) -> Result<()> {
    let threads = db.count_threads().await?;
    let participants = db.count_participants().await?;
    let messages = db.count_messages().await?;

    println!("Database Statistics");
    println!("-------------------");
    println!("Threads:      {threads}");
    println!("Participants: {participants}");
    println!("Messages:     {messages}");

    Ok(())
}

fn format_summary(summary: &ThreadSummary, user: UserId) -> String {
    let others: Vec<String> = summary
        .participants
        .iter()
        .filter(|p| p.user_id != user)
        .map(|p| p.user_id.to_string())
        .collect();
    let unread = summary.participant(user).map_or(0, |p| p.unread_count);
    let date = summary.thread.latest_message_at.format("%Y-%m-%d %H:%M");
    let preview = summary
        .last_message
        .as_ref()
        .map_or_else(|| "(no messages)".to_string(), |m| truncate(&m.body, 60));
    let marker = if unread > 0 {
        format!(" [{unread} unread]")
    } else {
        String::new()
    };
    format!(
        "{} | {} | with {}{} | {}",
        summary.thread.id,
        date,
        others.join(", "),
        marker,
        preview
    )
}

fn print_detail(detail: &ThreadDetail) {
    let with = detail
        .counterpart()
        .map_or_else(|| "-".to_string(), |p| p.user_id.to_string());
    println!("Thread:  {}", detail.thread.id);
    println!("With:    {with}");
    println!("Started: {}", detail.thread.created_at);
    println!("Status:  {}", detail.viewer.read_state());
    println!();

    for msg in &detail.messages {
        let who = if msg.sender_user_id == detail.viewer.user_id {
            "you".to_string()
        } else {
            msg.sender_user_id.to_string()
        };
        println!("--- {} @ {} ---", who, msg.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!("{}", msg.body);
        println!();
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_chars {
        s
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
