use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "freshtime", version, about = "FreshBooks weekly time summary CLI")]
pub struct Opts {
    /// Log requests and token refreshes to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authenticate with FreshBooks via OAuth
    Setup {
        /// Authorization code from the redirect URL; prompted for when omitted
        #[arg(long)]
        code: Option<String>,
    },

    /// Exchange the saved refresh token for a new access token
    Refresh,

    /// List clients with their IDs
    Clients,

    /// Show weekly time summary grouped by client
    Weekly {
        /// Show the week containing this date (YYYY-MM-DD)
        #[arg(long)]
        week_of: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create an invoice for all unbilled time entries for a client
    Invoice {
        client_id: i64,
        /// Override the hourly rate for this run
        #[arg(long)]
        rate: Option<String>,
        /// Override currency code (default: config or USD)
        #[arg(long)]
        currency: Option<String>,
        /// Show what would be invoiced without creating it
        #[arg(long)]
        dry_run: bool,
        /// Add notes to the invoice
        #[arg(long)]
        notes: Option<String>,
    },

    /// Initialize .freshtime.json in the current directory
    Init,

    /// Log a time entry
    Log {
        /// Note for the time entry
        #[arg(short, long)]
        message: String,
        /// Duration (e.g. 2h, 30m, 1h30m)
        #[arg(short, long)]
        duration: String,
        #[command(flatten)]
        target: EntryTarget,
    },

    /// Start a time tracking timer
    Start {
        /// Note for the time entry
        #[arg(short, long, default_value = "")]
        message: String,
        #[command(flatten)]
        target: EntryTarget,
    },

    /// Stop the running timer and log the time entry
    Stop {
        /// Override the note set at start
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show the current timer status
    Status,
}

/// Where an entry is logged; unset ids fall back to `.freshtime.json`.
#[derive(Args, Debug, Clone, Default)]
pub struct EntryTarget {
    /// Client ID (overrides .freshtime.json)
    #[arg(long)]
    pub client: Option<i64>,
    /// Project ID (overrides .freshtime.json)
    #[arg(long)]
    pub project: Option<i64>,
    /// Service ID (overrides .freshtime.json)
    #[arg(long)]
    pub service: Option<i64>,
    /// Mark as non-billable
    #[arg(long)]
    pub no_billable: bool,
}
