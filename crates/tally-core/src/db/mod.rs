//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `accounts` - Chart of accounts per client
//! - `import_sessions` - Import sessions, extracted rows and account mappings
//! - `journal` - Committed journal entries and lines
//! - `audit` - Audit log

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod accounts;
mod audit;
mod import_sessions;
mod journal;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "TALLY_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"tally-salt-v1-gl";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
}

impl Database {
    /// Open an encrypted database
    ///
    /// Requires `TALLY_DB_KEY`. The SQLCipher key is derived from the
    /// passphrase with Argon2. Use `new_unencrypted()` for development.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Open an unencrypted database (development and tests)
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Open a database with an explicit encryption passphrase
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?);
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")
            });
            Pool::builder().max_size(10).build(manager)?
        } else {
            // foreign_keys is per connection
            let manager = manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL: pollers read while the import loop writes
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Chart of accounts, one per client
            CREATE TABLE IF NOT EXISTS chart_accounts (
                id INTEGER PRIMARY KEY,
                client_id TEXT NOT NULL,
                number TEXT NOT NULL,
                name TEXT NOT NULL,
                account_type TEXT NOT NULL DEFAULT 'expense',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(client_id, number)
            );

            CREATE INDEX IF NOT EXISTS idx_chart_accounts_client ON chart_accounts(client_id);

            -- Import sessions (one file-import attempt each)
            CREATE TABLE IF NOT EXISTS import_sessions (
                id INTEGER PRIMARY KEY,
                client_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',     -- pending, processing, matched, completed, failed, cancelled, rejected
                stage TEXT NOT NULL DEFAULT 'upload',
                filename TEXT,
                file_hash TEXT NOT NULL,
                row_count INTEGER NOT NULL DEFAULT 0,
                processed_count INTEGER NOT NULL DEFAULT 0,
                imported_count INTEGER NOT NULL DEFAULT 0,
                skipped_count INTEGER NOT NULL DEFAULT 0,
                accounts_created INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                started_at DATETIME,
                completed_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_import_sessions_client ON import_sessions(client_id, status);
            CREATE INDEX IF NOT EXISTS idx_import_sessions_hash ON import_sessions(client_id, file_hash);

            -- Extracted rows, kept so a session can resume without the file
            CREATE TABLE IF NOT EXISTS import_rows (
                session_id INTEGER NOT NULL REFERENCES import_sessions(id) ON DELETE CASCADE,
                row_index INTEGER NOT NULL,
                data TEXT NOT NULL,                         -- JSON ExtractedRow
                PRIMARY KEY (session_id, row_index)
            );

            -- Per-session decisions for each distinct account reference
            CREATE TABLE IF NOT EXISTS account_mappings (
                session_id INTEGER NOT NULL REFERENCES import_sessions(id) ON DELETE CASCADE,
                account_ref TEXT NOT NULL,
                action TEXT NOT NULL,                       -- map, create, skip
                target_account_id INTEGER,
                notes TEXT NOT NULL DEFAULT '',
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (session_id, account_ref)
            );

            -- Committed journal entries
            CREATE TABLE IF NOT EXISTS journal_entries (
                id INTEGER PRIMARY KEY,
                client_id TEXT NOT NULL,
                import_session_id INTEGER REFERENCES import_sessions(id),
                description TEXT NOT NULL,
                entry_date TEXT NOT NULL,
                reference_number TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_journal_entries_client ON journal_entries(client_id);
            CREATE INDEX IF NOT EXISTS idx_journal_entries_session ON journal_entries(import_session_id);

            CREATE TABLE IF NOT EXISTS journal_lines (
                id INTEGER PRIMARY KEY,
                entry_id INTEGER NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
                account_id INTEGER NOT NULL REFERENCES chart_accounts(id),
                debit_amount REAL NOT NULL DEFAULT 0,
                credit_amount REAL NOT NULL DEFAULT 0,
                description TEXT,
                memo TEXT,
                CHECK (NOT (debit_amount > 0 AND credit_amount > 0))
            );

            CREATE INDEX IF NOT EXISTS idx_journal_lines_entry ON journal_lines(entry_id);
            CREATE INDEX IF NOT EXISTS idx_journal_lines_account ON journal_lines(account_id);

            -- Audit log (every mutation through the API)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                actor TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_log_action ON audit_log(action);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
