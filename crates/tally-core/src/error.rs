//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The client already has an import running
    #[error("Client already has import session {session_id} in progress")]
    SessionConflict { session_id: i64 },

    /// The operation targets a session that has already finished
    #[error("Import session {session_id} is {status} and accepts no further changes")]
    StaleSession { session_id: i64, status: String },

    /// Some account references have no mapping decision yet
    #[error("Account references still need a mapping: {}", .0.join(", "))]
    MappingIncomplete(Vec<String>),
}

impl Error {
    /// Errors caused by the caller's request rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Import(_) | Self::InvalidData(_) | Self::MappingIncomplete(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
