//! Import session, extracted row and mapping operations
//!
//! Status changes are guarded in SQL so a session that already reached a
//! terminal status is never written again; the returned bool says whether the
//! guarded update applied.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    AccountMapping, ExtractedRow, ImportSession, ImportStage, ImportStatus, MappingAction,
    NewImportSession,
};

const SESSION_COLUMNS: &str = "id, client_id, status, stage, filename, file_hash, row_count, \
    processed_count, imported_count, skipped_count, accounts_created, error, created_at, \
    started_at, completed_at";

impl Database {
    /// Create a new import session in the `analyzing` stage
    pub fn create_import_session(&self, session: &NewImportSession) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO import_sessions (client_id, status, stage, filename, file_hash, row_count)
            VALUES (?, 'pending', 'analyzing', ?, ?, ?)
            "#,
            params![
                session.client_id,
                session.filename,
                session.file_hash,
                session.row_count,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get an import session by ID
    pub fn get_import_session(&self, id: i64) -> Result<Option<ImportSession>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {} FROM import_sessions WHERE id = ?", SESSION_COLUMNS),
                params![id],
                Self::map_import_session_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Get an import session, only if it belongs to the client
    pub fn get_client_import_session(
        &self,
        client_id: &str,
        id: i64,
    ) -> Result<Option<ImportSession>> {
        Ok(self
            .get_import_session(id)?
            .filter(|s| s.client_id == client_id))
    }

    /// The client's most recent session, whatever its status
    pub fn latest_import_session(&self, client_id: &str) -> Result<Option<ImportSession>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!(
                    "SELECT {} FROM import_sessions WHERE client_id = ? ORDER BY id DESC LIMIT 1",
                    SESSION_COLUMNS
                ),
                params![client_id],
                Self::map_import_session_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Non-terminal sessions for a client, newest first
    pub fn active_import_sessions(&self, client_id: &str) -> Result<Vec<ImportSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM import_sessions
            WHERE client_id = ? AND status IN ('pending', 'processing', 'matched')
            ORDER BY id DESC"#,
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map(params![client_id], Self::map_import_session_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Recent sessions for a client, newest first
    pub fn list_import_sessions(&self, client_id: &str, limit: i64) -> Result<Vec<ImportSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_sessions WHERE client_id = ? ORDER BY id DESC LIMIT ?",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map(params![client_id, limit], Self::map_import_session_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Move a pending/matched session between analysis and mapping states
    pub fn set_import_review_state(
        &self,
        session_id: i64,
        status: ImportStatus,
        stage: ImportStage,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let count = conn.execute(
            r#"UPDATE import_sessions SET status = ?, stage = ?
            WHERE id = ? AND status IN ('pending', 'matched')"#,
            params![status.as_str(), stage.as_str(), session_id],
        )?;
        Ok(count > 0)
    }

    /// Freeze mappings and enter the import loop
    pub fn begin_import_processing(&self, session_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let count = conn.execute(
            r#"UPDATE import_sessions SET
                status = 'processing',
                stage = 'importing',
                processed_count = 0,
                imported_count = 0,
                skipped_count = 0,
                started_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status IN ('pending', 'matched')"#,
            params![session_id],
        )?;
        Ok(count > 0)
    }

    /// Persist loop counters while the session is processing
    pub fn update_import_counts(
        &self,
        session_id: i64,
        processed: i64,
        imported: i64,
        skipped: i64,
        accounts_created: i64,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let count = conn.execute(
            r#"UPDATE import_sessions SET
                processed_count = ?,
                imported_count = ?,
                skipped_count = ?,
                accounts_created = ?
            WHERE id = ? AND status = 'processing'"#,
            params![processed, imported, skipped, accounts_created, session_id],
        )?;
        Ok(count > 0)
    }

    /// Write the loop's final counters whatever the session's status.
    /// A cancel or failure may already have made the session terminal.
    pub fn record_final_import_counts(
        &self,
        session_id: i64,
        processed: i64,
        imported: i64,
        skipped: i64,
        accounts_created: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE import_sessions SET
                processed_count = ?,
                imported_count = ?,
                skipped_count = ?,
                accounts_created = ?
            WHERE id = ?"#,
            params![processed, imported, skipped, accounts_created, session_id],
        )?;
        Ok(())
    }

    /// Move a non-terminal session to a terminal status
    pub fn finish_import_session(
        &self,
        session_id: i64,
        status: ImportStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let stage = ImportStage::for_terminal(status).unwrap_or(ImportStage::Failed);
        let conn = self.conn()?;
        let count = conn.execute(
            r#"UPDATE import_sessions SET
                status = ?,
                stage = ?,
                error = COALESCE(?, error),
                completed_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status IN ('pending', 'processing', 'matched')"#,
            params![status.as_str(), stage.as_str(), error, session_id],
        )?;
        Ok(count > 0)
    }

    /// Recover any sessions left in 'processing' (e.g. the server restarted
    /// mid-import). Marks them failed and returns how many were recovered.
    pub fn recover_stuck_imports(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.execute(
            r#"UPDATE import_sessions SET
                status = 'failed',
                stage = 'failed',
                error = 'Server restarted during import. Please re-import the file.',
                completed_at = CURRENT_TIMESTAMP
            WHERE status = 'processing'"#,
            [],
        )?;
        Ok(count as i64)
    }

    /// Store the extracted rows of a session, in order
    pub fn store_import_rows(&self, session_id: i64, rows: &[ExtractedRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO import_rows (session_id, row_index, data) VALUES (?, ?, ?)",
            )?;
            for (i, row) in rows.iter().enumerate() {
                stmt.execute(params![session_id, i as i64, serde_json::to_string(row)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Extracted rows of a session in extraction order
    pub fn get_import_rows(&self, session_id: i64) -> Result<Vec<ExtractedRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT data FROM import_rows WHERE session_id = ? ORDER BY row_index",
        )?;
        let raw = stmt
            .query_map(params![session_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.iter()
            .map(|data| serde_json::from_str(data).map_err(Error::from))
            .collect()
    }

    /// Insert or replace the decision for one account reference
    pub fn upsert_account_mapping(
        &self,
        session_id: i64,
        account_ref: &str,
        mapping: &AccountMapping,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO account_mappings (session_id, account_ref, action, target_account_id, notes)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (session_id, account_ref) DO UPDATE SET
                action = excluded.action,
                target_account_id = excluded.target_account_id,
                notes = excluded.notes,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                session_id,
                account_ref,
                mapping.action.as_str(),
                mapping.target_account_id,
                mapping.notes,
            ],
        )?;
        Ok(())
    }

    /// Every stored decision of a session, keyed by account reference
    pub fn get_account_mappings(&self, session_id: i64) -> Result<HashMap<String, AccountMapping>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT account_ref, action, target_account_id, notes
            FROM account_mappings WHERE session_id = ?"#,
        )?;
        let mappings = stmt
            .query_map(params![session_id], |row| {
                let action: String = row.get(1)?;
                Ok((
                    row.get::<_, String>(0)?,
                    AccountMapping {
                        action: action.parse().unwrap_or(MappingAction::Skip),
                        target_account_id: row.get(2)?,
                        notes: row.get(3)?,
                    },
                ))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(mappings)
    }

    fn map_import_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportSession> {
        let status: String = row.get(2)?;
        let stage: String = row.get(3)?;
        let created_at: String = row.get(12)?;
        let started_at: Option<String> = row.get(13)?;
        let completed_at: Option<String> = row.get(14)?;

        Ok(ImportSession {
            id: row.get(0)?,
            client_id: row.get(1)?,
            status: status.parse().unwrap_or(ImportStatus::Failed),
            stage: stage.parse().unwrap_or(ImportStage::Failed),
            filename: row.get(4)?,
            file_hash: row.get(5)?,
            row_count: row.get(6)?,
            processed_count: row.get(7)?,
            imported_count: row.get(8)?,
            skipped_count: row.get(9)?,
            accounts_created: row.get(10)?,
            error: row.get(11)?,
            created_at: parse_datetime(&created_at),
            started_at: started_at.as_deref().map(parse_datetime),
            completed_at: completed_at.as_deref().map(parse_datetime),
        })
    }
}
