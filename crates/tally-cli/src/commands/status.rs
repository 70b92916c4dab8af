//! Status command implementation

use std::fs;
use std::path::Path;

use anyhow::Result;
use tally_core::db::DB_KEY_ENV;
use tally_core::{Database, ImportManager};

use super::open_db;

pub fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                let clients = db.list_clients()?;
                println!();
                println!("   Clients: {}", clients.len());
                for client in clients {
                    let accounts = db.list_chart_accounts(&client)?.len();
                    let entries = db.list_journal_entries(&client, None)?.len();
                    println!(
                        "   - {}: {} accounts, {} journal entries",
                        client, accounts, entries
                    );
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}

/// Import history and live progress for one client
pub fn cmd_client_status(manager: &ImportManager, client: &str) -> Result<()> {
    let db: &Database = manager.db();
    let (debits, credits) = db.journal_totals(client)?;

    println!();
    println!("📊 Client: {}", client);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Accounts: {}", db.list_chart_accounts(client)?.len());
    println!("   Ledger: {:.2} debits / {:.2} credits", debits, credits);

    let progress = manager.progress(client)?;
    if progress.session_id.is_some() {
        println!(
            "   Latest import: {} ({}%, {} of {} rows, {} skipped)",
            progress.status,
            progress.percentage,
            progress.progress,
            progress.total,
            progress.skipped
        );
        if let Some(error) = &progress.error {
            println!("      {}", error);
        }
    } else {
        println!("   Latest import: none");
    }

    let sessions = db.list_import_sessions(client, 10)?;
    if !sessions.is_empty() {
        println!();
        println!("   Recent sessions:");
        for s in sessions {
            println!(
                "   #{:<5} {:<10} {:<10} {:>5} rows  {:>5} imported  {}",
                s.id,
                s.status.as_str(),
                s.stage.as_str(),
                s.row_count,
                s.imported_count,
                s.filename.as_deref().unwrap_or("-")
            );
        }
    }

    println!();
    Ok(())
}
