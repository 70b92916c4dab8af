//! Tally Core Library
//!
//! General-ledger import for multi-client bookkeeping:
//! - Database access and migrations (chart of accounts, sessions, journal)
//! - CSV extraction of general-ledger rows
//! - Account reference resolution (exact, fuzzy, missing)
//! - Journal entry validation (double-entry balance)
//! - Staged import sessions with live progress
//! - Advisory matching of bank transactions to bills and invoices

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod progress;
pub mod resolver;
pub mod session;

pub use config::TallyConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use ledger::ValidationError;
pub use matcher::EntityMatcher;
pub use progress::ProgressTracker;
pub use resolver::AccountResolver;
pub use session::ImportManager;
