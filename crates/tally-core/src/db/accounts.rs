//! Chart of accounts operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{AccountType, ChartAccount, NewChartAccount};

const ACCOUNT_COLUMNS: &str = "id, client_id, number, name, account_type, created_at";

impl Database {
    /// Add an account to a client's chart
    pub fn create_chart_account(
        &self,
        client_id: &str,
        account: &NewChartAccount,
    ) -> Result<ChartAccount> {
        let number = account.number.trim();
        let name = account.name.trim();
        if client_id.trim().is_empty() {
            return Err(Error::InvalidData("Client id is required".into()));
        }
        if number.is_empty() || name.is_empty() {
            return Err(Error::InvalidData(
                "Account number and name are required".into(),
            ));
        }
        if self.find_chart_account_by_number(client_id, number)?.is_some() {
            return Err(Error::InvalidData(format!(
                "Account number {} already exists",
                number
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chart_accounts (client_id, number, name, account_type) VALUES (?, ?, ?, ?)",
            params![client_id, number, name, account.account_type.as_str()],
        )?;
        let id = conn.last_insert_rowid();

        self.get_chart_account(id)?
            .ok_or_else(|| Error::NotFound(format!("Account {}", id)))
    }

    /// List a client's chart, ordered by account number
    pub fn list_chart_accounts(&self, client_id: &str) -> Result<Vec<ChartAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chart_accounts WHERE client_id = ? ORDER BY number, id",
            ACCOUNT_COLUMNS
        ))?;

        let accounts = stmt
            .query_map(params![client_id], Self::map_chart_account_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Get an account by ID
    pub fn get_chart_account(&self, id: i64) -> Result<Option<ChartAccount>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {} FROM chart_accounts WHERE id = ?", ACCOUNT_COLUMNS),
                params![id],
                Self::map_chart_account_row,
            )
            .optional()?;
        Ok(account)
    }

    /// Get an account by ID, only if it belongs to the client
    pub fn get_client_chart_account(
        &self,
        client_id: &str,
        id: i64,
    ) -> Result<Option<ChartAccount>> {
        Ok(self
            .get_chart_account(id)?
            .filter(|a| a.client_id == client_id))
    }

    /// Look an account up by its number
    pub fn find_chart_account_by_number(
        &self,
        client_id: &str,
        number: &str,
    ) -> Result<Option<ChartAccount>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM chart_accounts WHERE client_id = ? AND number = ?",
                    ACCOUNT_COLUMNS
                ),
                params![client_id, number.trim()],
                Self::map_chart_account_row,
            )
            .optional()?;
        Ok(account)
    }

    /// First unused numeric account number at or above `start`
    pub fn next_free_account_number(&self, client_id: &str, start: u32) -> Result<String> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT number FROM chart_accounts WHERE client_id = ?")?;
        let taken: std::collections::HashSet<String> = stmt
            .query_map(params![client_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<_, _>>()?;

        (start..=u32::MAX)
            .map(|n| n.to_string())
            .find(|n| !taken.contains(n))
            .ok_or_else(|| Error::InvalidData("No free account number".into()))
    }

    /// Remove an account that has no journal lines.
    /// Returns false when the client has no such account.
    pub fn delete_chart_account(&self, client_id: &str, id: i64) -> Result<bool> {
        let conn = self.conn()?;

        let line_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM journal_lines WHERE account_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if line_count > 0 {
            return Err(Error::InvalidData(format!(
                "Account {} has {} journal lines and cannot be deleted",
                id, line_count
            )));
        }

        let deleted = conn.execute(
            "DELETE FROM chart_accounts WHERE id = ? AND client_id = ?",
            params![id, client_id],
        )?;
        Ok(deleted > 0)
    }

    /// Clients that have a chart or an import session
    pub fn list_clients(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT client_id FROM chart_accounts
            UNION
            SELECT client_id FROM import_sessions
            ORDER BY client_id
            "#,
        )?;
        let clients = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(clients)
    }

    fn map_chart_account_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChartAccount> {
        let account_type: String = row.get(4)?;
        let created_at: String = row.get(5)?;

        Ok(ChartAccount {
            id: row.get(0)?,
            client_id: row.get(1)?,
            number: row.get(2)?,
            name: row.get(3)?,
            account_type: account_type.parse().unwrap_or(AccountType::Expense),
            created_at: parse_datetime(&created_at),
        })
    }
}
