//! Journal entry operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::ledger;
use crate::models::{JournalEntry, JournalEntryCandidate, JournalLine};

impl Database {
    /// Commit a validated entry and its counting lines in one transaction
    ///
    /// Every line account must belong to the client; an account deleted
    /// since mapping fails the commit and nothing is written. Entries for an
    /// import session are only accepted while that session is processing.
    pub fn commit_journal_entry(
        &self,
        client_id: &str,
        import_session_id: Option<i64>,
        entry: &JournalEntryCandidate,
    ) -> Result<i64> {
        let errors = ledger::validate(entry);
        if let Some(first) = errors.first() {
            return Err(Error::InvalidData(first.to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(session_id) = import_session_id {
            let status: Option<String> = tx
                .query_row(
                    "SELECT status FROM import_sessions WHERE id = ? AND client_id = ?",
                    params![session_id, client_id],
                    |row| row.get(0),
                )
                .optional()?;
            match status {
                Some(status) if status == "processing" => {}
                Some(status) => return Err(Error::StaleSession { session_id, status }),
                None => {
                    return Err(Error::NotFound(format!("Import session {}", session_id)))
                }
            }
        }

        let lines: Vec<_> = entry
            .lines
            .iter()
            .filter(|line| ledger::is_counting_line(line))
            .collect();

        for line in &lines {
            let account_id = line.account_id.unwrap_or_default();
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM chart_accounts WHERE id = ? AND client_id = ?",
                    params![account_id, client_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(Error::NotFound(format!(
                    "Account {} no longer exists",
                    account_id
                )));
            }
        }

        tx.execute(
            r#"
            INSERT INTO journal_entries (client_id, import_session_id, description, entry_date, reference_number)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                client_id,
                import_session_id,
                entry.description.trim(),
                entry.entry_date.trim(),
                entry.reference_number,
            ],
        )?;
        let entry_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO journal_lines (entry_id, account_id, debit_amount, credit_amount, description, memo)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for line in &lines {
                stmt.execute(params![
                    entry_id,
                    line.account_id,
                    line.debit_amount,
                    line.credit_amount,
                    line.description,
                    line.memo,
                ])?;
            }
        }

        tx.commit()?;
        Ok(entry_id)
    }

    /// Get an entry with its lines
    pub fn get_journal_entry(&self, id: i64) -> Result<Option<JournalEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                r#"SELECT id, client_id, import_session_id, description, entry_date, reference_number, created_at
                FROM journal_entries WHERE id = ?"#,
                params![id],
                Self::map_journal_entry_row,
            )
            .optional()?;

        match entry {
            Some(mut entry) => {
                entry.lines = self.get_journal_lines(entry.id)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Entries for a client, optionally limited to one import session
    pub fn list_journal_entries(
        &self,
        client_id: &str,
        import_session_id: Option<i64>,
    ) -> Result<Vec<JournalEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, client_id, import_session_id, description, entry_date, reference_number, created_at
            FROM journal_entries
            WHERE client_id = ? AND (? IS NULL OR import_session_id = ?)
            ORDER BY id"#,
        )?;
        let mut entries = stmt
            .query_map(
                params![client_id, import_session_id, import_session_id],
                Self::map_journal_entry_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for entry in &mut entries {
            entry.lines = self.get_journal_lines(entry.id)?;
        }
        Ok(entries)
    }

    /// Number of entries committed by an import session
    pub fn count_session_journal_entries(&self, import_session_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM journal_entries WHERE import_session_id = ?",
            params![import_session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Total debits and credits across a client's ledger
    pub fn journal_totals(&self, client_id: &str) -> Result<(f64, f64)> {
        let conn = self.conn()?;
        let totals = conn.query_row(
            r#"SELECT COALESCE(SUM(l.debit_amount), 0), COALESCE(SUM(l.credit_amount), 0)
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.client_id = ?"#,
            params![client_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(totals)
    }

    fn get_journal_lines(&self, entry_id: i64) -> Result<Vec<JournalLine>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, entry_id, account_id, debit_amount, credit_amount, description, memo
            FROM journal_lines WHERE entry_id = ? ORDER BY id"#,
        )?;
        let lines = stmt
            .query_map(params![entry_id], |row| {
                Ok(JournalLine {
                    id: row.get(0)?,
                    entry_id: row.get(1)?,
                    account_id: row.get(2)?,
                    debit_amount: row.get(3)?,
                    credit_amount: row.get(4)?,
                    description: row.get(5)?,
                    memo: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    fn map_journal_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalEntry> {
        let created_at: String = row.get(6)?;
        Ok(JournalEntry {
            id: row.get(0)?,
            client_id: row.get(1)?,
            import_session_id: row.get(2)?,
            description: row.get(3)?,
            entry_date: row.get(4)?,
            reference_number: row.get(5)?,
            lines: Vec::new(),
            created_at: parse_datetime(&created_at),
        })
    }
}
