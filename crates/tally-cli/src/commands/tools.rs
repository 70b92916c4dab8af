//! Standalone bookkeeping tools (validate, match)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tally_core::ledger;
use tally_core::models::{
    BankTransaction, Contact, JournalEntryCandidate, MatchCandidate, TransactionDirection,
};
use tally_core::EntityMatcher;

/// Input for `tally match`
#[derive(Debug, Default, Deserialize)]
pub struct MatchBatch {
    #[serde(default)]
    pub transactions: Vec<BankTransaction>,
    /// Candidates for money going out
    #[serde(default)]
    pub bills: Vec<MatchCandidate>,
    /// Candidates for money coming in
    #[serde(default)]
    pub invoices: Vec<MatchCandidate>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

fn read_json<T: serde::de::DeserializeOwned>(file: &Path) -> Result<T> {
    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", file.display()))
}

/// Check a journal entry file; returns whether it is valid
pub fn cmd_validate(file: &Path) -> Result<bool> {
    let entry: JournalEntryCandidate = read_json(file)?;
    let errors = ledger::validate(&entry);
    let (debits, credits) = ledger::totals(entry.lines.iter());

    let title = if entry.description.is_empty() {
        "(no description)"
    } else {
        entry.description.as_str()
    };
    println!("🧾 {}", title);
    println!("   Debits:  {:>12.2}", debits);
    println!("   Credits: {:>12.2}", credits);

    if errors.is_empty() {
        println!("✅ Entry is balanced and valid");
        return Ok(true);
    }

    println!("❌ {} problem(s):", errors.len());
    for e in &errors {
        println!("   - [{}] {}", e.code(), e);
    }
    Ok(false)
}

/// Match every transaction in a batch file; returns the number matched
pub fn cmd_match(matcher: &EntityMatcher, file: &Path) -> Result<usize> {
    let batch: MatchBatch = read_json(file)?;
    println!(
        "🔗 Matching {} transactions against {} bills and {} invoices...",
        batch.transactions.len(),
        batch.bills.len(),
        batch.invoices.len()
    );

    let results = matcher.match_all(
        &batch.transactions,
        &batch.bills,
        &batch.invoices,
        &batch.contacts,
    );

    let mut matched = 0;
    for (transaction_id, result) in &results {
        match result {
            Some(m) => {
                matched += 1;
                let kind = match m.direction {
                    TransactionDirection::Expense => "bill",
                    TransactionDirection::Income => "invoice",
                };
                println!(
                    "   txn {:>6} → {} {} (score {}, {} candidate(s))",
                    transaction_id,
                    kind,
                    m.counterpart_id,
                    m.score,
                    m.all_matches.len()
                );
            }
            None => println!("   txn {:>6} → no match", transaction_id),
        }
    }

    println!();
    println!("✅ Matched {} of {}", matched, results.len());
    Ok(matched)
}
