//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db, load_config)
//! - `accounts` - Chart of accounts commands (list, add, delete)
//! - `import` - General-ledger CSV import and session cancellation
//! - `serve` - Web server command
//! - `status` - Database and import status
//! - `tools` - Journal entry validation and bill/invoice matching

pub mod accounts;
pub mod core;
pub mod import;
pub mod serve;
pub mod status;
pub mod tools;

// Re-export command functions for main.rs
pub use accounts::*;
pub use core::*;
pub use import::*;
pub use serve::*;
pub use status::*;
pub use tools::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
