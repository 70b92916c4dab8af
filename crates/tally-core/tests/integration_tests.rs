//! Integration tests for tally-core
//!
//! These tests exercise the full extract → analyze → map → import workflow.

use std::collections::HashMap;

use tally_core::{
    db::Database,
    import::parse_rows,
    models::{
        AccountMapping, AccountType, ImportStatus, MappingAction, MatchType, NewChartAccount,
    },
    ImportManager, TallyConfig,
};

/// General-ledger extract for one month:
/// - two references that match the chart exactly (by number and by name)
/// - one misspelled reference that only matches fuzzily
/// - one reference with no counterpart ("6800 Software")
/// - one row with a date nobody can read
fn ledger_csv() -> &'static str {
    r#"Account,Date,Description,Debit,Credit,Reference
1000,03/01/2024,Owner contribution,5000.00,,DEP-1
Office Supplies,03/02/2024,Paper and toner,84.10,,INV-201
Ofice Supplies,03/05/2024,Printer ink,42.00,,INV-207
6800 Software,2024-03-07,Accounting subscription,29.00,,INV-215
1000,03/31/2024,Bank fee refund,,-12.50,
1000,not a date,Broken row,10.00,,
"#
}

fn setup_chart(db: &Database) {
    for (number, name, account_type) in [
        ("1000", "Cash", AccountType::Asset),
        ("6100", "Office Supplies", AccountType::Expense),
        ("6200", "Travel", AccountType::Expense),
    ] {
        db.create_chart_account(
            "acme",
            &NewChartAccount {
                number: number.into(),
                name: name.into(),
                account_type,
            },
        )
        .expect("Failed to create account");
    }
}

#[test]
fn test_full_import_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    setup_chart(&db);
    let manager = ImportManager::new(db.clone(), TallyConfig::default());

    let rows = parse_rows(ledger_csv().as_bytes()).expect("Failed to parse CSV");
    assert_eq!(rows.len(), 6);
    // Negative credit becomes a debit
    assert_eq!(rows[4].debit, 12.5);
    assert_eq!(rows[4].credit, 0.0);

    let analysis = manager
        .analyze("acme", Some("march.csv"), rows)
        .expect("Failed to analyze");

    let by_ref: HashMap<&str, _> = analysis
        .account_analysis
        .iter()
        .map(|a| (a.account_ref.as_str(), a))
        .collect();
    assert_eq!(by_ref.len(), 4);
    assert_eq!(by_ref["1000"].match_type, MatchType::Exact);
    assert_eq!(by_ref["1000"].transaction_count, 3);
    assert_eq!(by_ref["Office Supplies"].match_type, MatchType::Exact);
    assert_eq!(by_ref["Ofice Supplies"].match_type, MatchType::Fuzzy);
    assert_eq!(by_ref["6800 Software"].match_type, MatchType::Missing);
    assert!(!analysis.summary.ready_to_import);

    // User confirms the fuzzy match and asks for the new account
    let supplies = db
        .find_chart_account_by_number("acme", "6100")
        .unwrap()
        .unwrap();
    let mappings = HashMap::from([
        (
            "Ofice Supplies".to_string(),
            AccountMapping::map_to(supplies.id, "confirmed"),
        ),
        ("6800 Software".to_string(), AccountMapping::create()),
    ]);

    let summary = manager
        .start_import("acme", analysis.session_id, &mappings, true)
        .expect("Failed to import");

    assert_eq!(summary.status, ImportStatus::Completed);
    assert_eq!(summary.successful, 5);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.accounts_created, 1);
    assert_eq!(summary.skipped_rows[0].row_index, 5);
    assert!(summary.skipped_rows[0].reason.contains("date"));

    // Every committed entry balances, and so does the ledger
    let entries = db
        .list_journal_entries("acme", Some(analysis.session_id))
        .unwrap();
    assert_eq!(entries.len(), 5);
    for entry in &entries {
        let debits: f64 = entry.lines.iter().map(|l| l.debit_amount).sum();
        let credits: f64 = entry.lines.iter().map(|l| l.credit_amount).sum();
        assert!((debits - credits).abs() < 0.01, "entry {} unbalanced", entry.id);
        assert!(entry
            .lines
            .iter()
            .all(|l| !(l.debit_amount > 0.0 && l.credit_amount > 0.0)));
    }
    let (debits, credits) = db.journal_totals("acme").unwrap();
    assert!((debits - credits).abs() < 0.01);

    let software = db
        .find_chart_account_by_number("acme", "6800")
        .unwrap()
        .expect("Software account created");
    assert_eq!(software.name, "Software");

    let progress = manager.progress("acme").unwrap();
    assert_eq!(progress.status, "completed");
    assert_eq!(progress.total, 6);
    assert_eq!(progress.progress, 6);
    assert_eq!(progress.imported + progress.skipped, progress.progress);
    assert_eq!(progress.percentage, 100);
}

#[test]
fn test_skip_mapping_leaves_rows_out() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    setup_chart(&db);
    let manager = ImportManager::new(db.clone(), TallyConfig::default());

    let rows = parse_rows(ledger_csv().as_bytes()).unwrap();
    let analysis = manager.analyze("acme", None, rows).unwrap();

    let mappings = HashMap::from([
        ("Ofice Supplies".to_string(), AccountMapping::skip()),
        ("6800 Software".to_string(), AccountMapping::skip()),
    ]);
    let session = manager
        .apply_mappings("acme", analysis.session_id, &mappings)
        .unwrap();
    assert_eq!(session.status, ImportStatus::Matched);

    let summary = manager
        .start_import("acme", analysis.session_id, &HashMap::new(), false)
        .unwrap();
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.accounts_created, 0);
    assert!(db.find_chart_account_by_number("acme", "6800").unwrap().is_none());

    let stored = db.get_account_mappings(analysis.session_id).unwrap();
    assert_eq!(stored["6800 Software"].action, MappingAction::Skip);
}

#[test]
fn test_clients_do_not_share_charts() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    setup_chart(&db);
    let manager = ImportManager::new(db, TallyConfig::default());

    let rows = parse_rows(ledger_csv().as_bytes()).unwrap();
    let analysis = manager.analyze("globex", None, rows).unwrap();

    assert!(analysis
        .account_analysis
        .iter()
        .all(|a| a.match_type == MatchType::Missing));
    assert_eq!(analysis.summary.match_rate, 0);
}
