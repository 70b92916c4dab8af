//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Import general-ledger extracts into balanced books
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "General-ledger import and reconciliation for bookkeepers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Matching/import configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage a client's chart of accounts
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Import a general-ledger CSV for a client
    Import {
        /// Client the ledger belongs to
        #[arg(short, long)]
        client: String,

        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Map a reference to an existing account number (REF=NUMBER, repeatable)
        #[arg(long = "map", value_name = "REF=NUMBER")]
        maps: Vec<String>,

        /// Skip every row carrying this reference (repeatable)
        #[arg(long = "skip", value_name = "REF")]
        skips: Vec<String>,

        /// Create accounts for references with no match
        #[arg(long)]
        create_missing: bool,

        /// Analyze only; show how references resolve without touching the books
        #[arg(long)]
        dry_run: bool,
    },

    /// Show database and import status
    Status {
        /// Only this client
        #[arg(short, long)]
        client: Option<String>,
    },

    /// Cancel or reject a client's open import session
    Cancel {
        /// Client whose session to stop
        #[arg(short, long)]
        client: String,

        /// Session ID
        #[arg(short, long)]
        session: i64,

        /// Reject a session under review instead of cancelling it
        #[arg(long)]
        reject: bool,
    },

    /// Check a journal entry (JSON file) against double-entry rules
    Validate {
        /// JSON file holding one journal entry
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Match bank transactions to bills and invoices (JSON file)
    Match {
        /// JSON file with transactions, bills, invoices and contacts
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    /// List accounts (every client when --client is omitted)
    List {
        #[arg(short, long)]
        client: Option<String>,
    },

    /// Add an account
    Add {
        #[arg(short, long)]
        client: String,

        /// Account number, e.g. 6100
        #[arg(long)]
        number: String,

        /// Account name, e.g. "Office Supplies"
        #[arg(long)]
        name: String,

        /// asset, liability, equity, income or expense
        #[arg(long = "type", default_value = "expense")]
        account_type: String,
    },

    /// Delete an account that has no journal lines
    Delete {
        #[arg(short, long)]
        client: String,

        /// Account number
        #[arg(long)]
        number: String,
    },
}
