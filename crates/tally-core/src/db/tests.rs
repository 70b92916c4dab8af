//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn account(db: &Database, client: &str, number: &str, name: &str) -> ChartAccount {
        db.create_chart_account(
            client,
            &NewChartAccount {
                number: number.into(),
                name: name.into(),
                account_type: AccountType::Expense,
            },
        )
        .unwrap()
    }

    fn session(db: &Database, client: &str, hash: &str) -> i64 {
        db.create_import_session(&NewImportSession {
            client_id: client.into(),
            filename: Some("gl.csv".into()),
            file_hash: hash.into(),
            row_count: 2,
        })
        .unwrap()
    }

    fn entry(debit_account: i64, credit_account: i64, amount: f64) -> JournalEntryCandidate {
        JournalEntryCandidate {
            description: "Office supplies".into(),
            entry_date: "2024-03-01".into(),
            reference_number: None,
            lines: vec![
                JournalLineCandidate::debit(debit_account, amount),
                JournalLineCandidate::credit(credit_account, amount),
            ],
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_chart_accounts("acme").unwrap().is_empty());
        assert!(db.list_clients().unwrap().is_empty());
    }

    #[test]
    fn test_chart_account_crud() {
        let db = Database::in_memory().unwrap();

        let supplies = account(&db, "acme", "6100", "Office Supplies");
        let cash = account(&db, "acme", "1000", "Cash");
        account(&db, "globex", "1000", "Cash");

        let chart = db.list_chart_accounts("acme").unwrap();
        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].id, cash.id);
        assert_eq!(chart[1].label(), "6100 Office Supplies");

        let found = db.find_chart_account_by_number("acme", "6100").unwrap();
        assert_eq!(found.map(|a| a.id), Some(supplies.id));
        assert!(db.find_chart_account_by_number("acme", "7000").unwrap().is_none());

        // Client scoping
        assert!(db.get_client_chart_account("globex", cash.id).unwrap().is_none());
        assert!(db.get_chart_account(cash.id).unwrap().is_some());

        assert_eq!(db.list_clients().unwrap(), vec!["acme", "globex"]);
    }

    #[test]
    fn test_chart_account_rejects_duplicates_and_blanks() {
        let db = Database::in_memory().unwrap();
        account(&db, "acme", "1000", "Cash");

        let duplicate = db.create_chart_account(
            "acme",
            &NewChartAccount {
                number: "1000".into(),
                name: "Petty Cash".into(),
                account_type: AccountType::Asset,
            },
        );
        assert!(matches!(duplicate, Err(Error::InvalidData(_))));

        let blank = db.create_chart_account(
            "acme",
            &NewChartAccount {
                number: " ".into(),
                name: "Nothing".into(),
                account_type: AccountType::Asset,
            },
        );
        assert!(matches!(blank, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_next_free_account_number() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.next_free_account_number("acme", 9000).unwrap(), "9000");

        account(&db, "acme", "9000", "Imported A");
        account(&db, "acme", "9001", "Imported B");
        assert_eq!(db.next_free_account_number("acme", 9000).unwrap(), "9002");

        // Other clients' numbers do not count
        assert_eq!(db.next_free_account_number("globex", 9000).unwrap(), "9000");
    }

    #[test]
    fn test_delete_account_with_lines_is_refused() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let supplies = account(&db, "acme", "6100", "Office Supplies");
        let unused = account(&db, "acme", "6200", "Travel");

        db.commit_journal_entry("acme", None, &entry(supplies.id, cash.id, 25.0))
            .unwrap();

        assert!(matches!(
            db.delete_chart_account("acme", cash.id),
            Err(Error::InvalidData(_))
        ));
        assert!(!db.delete_chart_account("globex", unused.id).unwrap());
        assert!(db.delete_chart_account("acme", unused.id).unwrap());
        assert!(db.get_chart_account(unused.id).unwrap().is_none());
    }

    #[test]
    fn test_commit_journal_entry() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let supplies = account(&db, "acme", "6100", "Office Supplies");

        let id = db
            .commit_journal_entry("acme", None, &entry(supplies.id, cash.id, 42.5))
            .unwrap();

        let stored = db.get_journal_entry(id).unwrap().unwrap();
        assert_eq!(stored.description, "Office supplies");
        assert_eq!(stored.entry_date, "2024-03-01");
        assert_eq!(stored.lines.len(), 2);
        assert_eq!(stored.lines[0].account_id, supplies.id);
        assert_eq!(stored.lines[0].debit_amount, 42.5);
        assert_eq!(stored.lines[1].credit_amount, 42.5);

        let (debits, credits) = db.journal_totals("acme").unwrap();
        assert_eq!(debits, credits);
        assert_eq!(db.journal_totals("globex").unwrap(), (0.0, 0.0));
    }

    #[test]
    fn test_commit_drops_zero_lines() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let supplies = account(&db, "acme", "6100", "Office Supplies");

        let mut candidate = entry(supplies.id, cash.id, 10.0);
        candidate.lines.push(JournalLineCandidate {
            account_id: Some(cash.id),
            ..Default::default()
        });

        let id = db.commit_journal_entry("acme", None, &candidate).unwrap();
        assert_eq!(db.get_journal_entry(id).unwrap().unwrap().lines.len(), 2);
    }

    #[test]
    fn test_commit_rejects_invalid_entries() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let supplies = account(&db, "acme", "6100", "Office Supplies");

        let mut unbalanced = entry(supplies.id, cash.id, 10.0);
        unbalanced.lines[1].credit_amount = 9.0;
        assert!(matches!(
            db.commit_journal_entry("acme", None, &unbalanced),
            Err(Error::InvalidData(_))
        ));

        let mut undated = entry(supplies.id, cash.id, 10.0);
        undated.entry_date = String::new();
        assert!(db.commit_journal_entry("acme", None, &undated).is_err());

        assert!(db.list_journal_entries("acme", None).unwrap().is_empty());
    }

    #[test]
    fn test_commit_rejects_missing_or_foreign_account() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let supplies = account(&db, "acme", "6100", "Office Supplies");
        let foreign = account(&db, "globex", "6100", "Office Supplies");

        assert!(matches!(
            db.commit_journal_entry("acme", None, &entry(foreign.id, cash.id, 5.0)),
            Err(Error::NotFound(_))
        ));

        db.delete_chart_account("acme", supplies.id).unwrap();
        assert!(matches!(
            db.commit_journal_entry("acme", None, &entry(supplies.id, cash.id, 5.0)),
            Err(Error::NotFound(_))
        ));

        // Nothing partial was written
        let conn = db.conn().unwrap();
        let lines: i64 = conn
            .query_row("SELECT COUNT(*) FROM journal_lines", [], |row| row.get(0))
            .unwrap();
        assert_eq!(lines, 0);
    }

    #[test]
    fn test_both_sides_on_one_line_blocked_by_schema() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let conn = db.conn().unwrap();

        conn.execute(
            "INSERT INTO journal_entries (client_id, description, entry_date) VALUES ('acme', 'x', '2024-01-01')",
            [],
        )
        .unwrap();
        let entry_id = conn.last_insert_rowid();

        let result = conn.execute(
            "INSERT INTO journal_lines (entry_id, account_id, debit_amount, credit_amount) VALUES (?, ?, 5, 5)",
            params![entry_id, cash.id],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_import_session_lifecycle() {
        let db = Database::in_memory().unwrap();
        let id = session(&db, "acme", "abc");

        let created = db.get_import_session(id).unwrap().unwrap();
        assert_eq!(created.status, ImportStatus::Pending);
        assert_eq!(created.stage, ImportStage::Analyzing);
        assert_eq!(created.filename.as_deref(), Some("gl.csv"));
        assert!(created.started_at.is_none());

        assert!(db
            .set_import_review_state(id, ImportStatus::Matched, ImportStage::Analyzed)
            .unwrap());
        assert!(db.begin_import_processing(id).unwrap());
        // Already processing
        assert!(!db.begin_import_processing(id).unwrap());
        assert!(!db
            .set_import_review_state(id, ImportStatus::Pending, ImportStage::Mapping)
            .unwrap());

        assert!(db.update_import_counts(id, 2, 1, 1, 0).unwrap());
        assert!(db
            .finish_import_session(id, ImportStatus::Completed, None)
            .unwrap());

        let done = db.get_import_session(id).unwrap().unwrap();
        assert_eq!(done.status, ImportStatus::Completed);
        assert_eq!(done.stage, ImportStage::Completed);
        assert_eq!(done.processed_count, 2);
        assert_eq!(done.imported_count, 1);
        assert_eq!(done.skipped_count, 1);
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());

        // Terminal sessions are never written again
        assert!(!db.update_import_counts(id, 5, 5, 0, 0).unwrap());
        assert!(!db
            .finish_import_session(id, ImportStatus::Failed, Some("late"))
            .unwrap());
        let still = db.get_import_session(id).unwrap().unwrap();
        assert_eq!(still.status, ImportStatus::Completed);
        assert_eq!(still.error, None);
    }

    #[test]
    fn test_active_and_latest_sessions() {
        let db = Database::in_memory().unwrap();
        let first = session(&db, "acme", "one");
        let second = session(&db, "acme", "two");
        session(&db, "globex", "three");

        db.finish_import_session(first, ImportStatus::Rejected, Some("Rejected by user"))
            .unwrap();

        let active = db.active_import_sessions("acme").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second);

        assert_eq!(db.latest_import_session("acme").unwrap().unwrap().id, second);
        assert!(db.latest_import_session("nobody").unwrap().is_none());
        assert_eq!(db.list_import_sessions("acme", 10).unwrap().len(), 2);
        assert!(db.get_client_import_session("globex", first).unwrap().is_none());
    }

    #[test]
    fn test_recover_stuck_imports() {
        let db = Database::in_memory().unwrap();
        let stuck = session(&db, "acme", "one");
        let waiting = session(&db, "globex", "two");
        db.begin_import_processing(stuck).unwrap();

        assert_eq!(db.recover_stuck_imports().unwrap(), 1);

        let recovered = db.get_import_session(stuck).unwrap().unwrap();
        assert_eq!(recovered.status, ImportStatus::Failed);
        assert!(recovered.error.unwrap().contains("restarted"));
        assert_eq!(
            db.get_import_session(waiting).unwrap().unwrap().status,
            ImportStatus::Pending
        );
        assert_eq!(db.recover_stuck_imports().unwrap(), 0);
    }

    #[test]
    fn test_import_rows_keep_order() {
        let db = Database::in_memory().unwrap();
        let id = session(&db, "acme", "rows");
        let rows: Vec<ExtractedRow> = (0..3)
            .map(|i| ExtractedRow {
                account_ref: format!("Ref {}", i),
                date: "2024-01-01".into(),
                description: String::new(),
                debit: i as f64,
                credit: 0.0,
                reference: (i == 1).then(|| "INV-1".to_string()),
            })
            .collect();

        db.store_import_rows(id, &rows).unwrap();
        assert_eq!(db.get_import_rows(id).unwrap(), rows);
        assert!(db.get_import_rows(id + 1).unwrap().is_empty());
    }

    #[test]
    fn test_account_mapping_upsert() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let id = session(&db, "acme", "maps");

        db.upsert_account_mapping(id, "Bank", &AccountMapping::create())
            .unwrap();
        db.upsert_account_mapping(id, "Misc", &AccountMapping::skip())
            .unwrap();
        db.upsert_account_mapping(id, "Bank", &AccountMapping::map_to(cash.id, "user"))
            .unwrap();

        let mappings = db.get_account_mappings(id).unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings["Bank"], AccountMapping::map_to(cash.id, "user"));
        assert_eq!(mappings["Misc"].action, MappingAction::Skip);
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit("alice@example.com", "import_started", Some("import_session"), Some(7), None)
            .unwrap();
        db.log_audit("system", "recover_imports", None, None, Some("1 session"))
            .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "recover_imports");
        assert_eq!(entries[1].actor, "alice@example.com");
        assert_eq!(entries[1].entity_id, Some(7));
    }

    #[test]
    fn test_session_scoped_journal_queries() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let supplies = account(&db, "acme", "6100", "Office Supplies");
        let id = session(&db, "acme", "journal");
        assert!(db.begin_import_processing(id).unwrap());

        db.commit_journal_entry("acme", Some(id), &entry(supplies.id, cash.id, 1.0))
            .unwrap();
        db.commit_journal_entry("acme", None, &entry(supplies.id, cash.id, 2.0))
            .unwrap();

        assert_eq!(db.count_session_journal_entries(id).unwrap(), 1);
        assert_eq!(db.list_journal_entries("acme", Some(id)).unwrap().len(), 1);
        assert_eq!(db.list_journal_entries("acme", None).unwrap().len(), 2);
    }

    #[test]
    fn test_commit_requires_processing_session() {
        let db = Database::in_memory().unwrap();
        let cash = account(&db, "acme", "1000", "Cash");
        let supplies = account(&db, "acme", "6100", "Office Supplies");
        let id = session(&db, "acme", "guard");

        // Not started yet
        assert!(matches!(
            db.commit_journal_entry("acme", Some(id), &entry(supplies.id, cash.id, 1.0)),
            Err(Error::StaleSession { .. })
        ));

        assert!(db.begin_import_processing(id).unwrap());
        db.commit_journal_entry("acme", Some(id), &entry(supplies.id, cash.id, 1.0))
            .unwrap();

        db.finish_import_session(id, ImportStatus::Cancelled, Some("Import cancelled by user"))
            .unwrap();
        match db.commit_journal_entry("acme", Some(id), &entry(supplies.id, cash.id, 1.0)) {
            Err(Error::StaleSession { session_id, status }) => {
                assert_eq!(session_id, id);
                assert_eq!(status, "cancelled");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(db.count_session_journal_entries(id).unwrap(), 1);

        // Another client's session is not visible
        assert!(matches!(
            db.commit_journal_entry("globex", Some(id), &entry(supplies.id, cash.id, 1.0)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_final_counts_survive_terminal_status() {
        let db = Database::in_memory().unwrap();
        let id = session(&db, "acme", "final");
        assert!(db.begin_import_processing(id).unwrap());
        assert!(db.update_import_counts(id, 25, 25, 0, 1).unwrap());

        db.finish_import_session(id, ImportStatus::Cancelled, Some("Import cancelled by user"))
            .unwrap();
        // The checkpoint write is refused once terminal; the final write is not
        assert!(!db.update_import_counts(id, 38, 38, 0, 1).unwrap());
        db.record_final_import_counts(id, 38, 37, 1, 1).unwrap();

        let done = db.get_import_session(id).unwrap().unwrap();
        assert_eq!(done.status, ImportStatus::Cancelled);
        assert_eq!(done.processed_count, 38);
        assert_eq!(done.imported_count, 37);
        assert_eq!(done.skipped_count, 1);
        assert_eq!(done.accounts_created, 1);
    }
}
