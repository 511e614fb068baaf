//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// chat-relay: durable webhook outbox for multi-tenant chat sessions
///
/// Without a subcommand, runs the webhook dispatcher over the store file
/// until interrupted.
#[derive(Debug, Parser)]
#[command(name = "chat-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the JSON store file
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Dispatcher poll interval in seconds
    #[arg(long = "poll-interval")]
    pub poll_interval: Option<u64>,

    /// Maximum outbox rows processed per poll
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,

    /// Per-attempt webhook timeout in seconds
    #[arg(long = "send-timeout")]
    pub send_timeout: Option<u64>,

    /// User-Agent header for webhook requests
    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,

    /// Purge sent/failed rows older than this many hours (0 = keep)
    #[arg(long = "retention-hours")]
    pub retention_hours: Option<u64>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for chat-relay
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "chat-relay.toml")]
        output: PathBuf,
    },

    /// Insert a pending webhook event into the store
    Enqueue {
        /// Tenant that owns the event
        #[arg(long)]
        owner: String,

        /// Session the event belongs to (omit for an owner-level event)
        #[arg(long)]
        session: Option<String>,

        /// Event type, e.g. Message or Connected
        #[arg(long)]
        event: String,

        /// Event data as JSON
        #[arg(long, default_value = "null")]
        data: String,
    },

    /// Create a session record in the store
    AddSession {
        /// Tenant that owns the session
        #[arg(long)]
        owner: String,

        /// Session name, unique per owner
        #[arg(long)]
        name: String,

        /// Webhook endpoint for the session's events
        #[arg(long)]
        webhook: Option<String>,

        /// Comma-separated event types to forward (All for every type)
        #[arg(long, default_value = "All")]
        events: String,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Some(Command::Init { .. }))
    }
}
