//! Bill and invoice matching for bank transactions
//!
//! Scores a bank transaction against outstanding bills (money out) or invoices
//! (money in) on three weighted components:
//! - Amount: relative difference to the candidate amount (0-50)
//! - Date: days between transaction and candidate (0-30)
//! - Name: contact display/company name found in the description (0-30)
//!
//! Results below the configured minimum are discarded. Matches are advisory and
//! recomputed on demand.

use std::collections::HashMap;

use tracing::debug;

use crate::config::MatcherConfig;
use crate::import::parse_date;
use crate::models::{
    BankTransaction, Contact, MatchCandidate, MatchResult, ScoredMatch, TransactionDirection,
};

/// Weighted scorer shared by bill and invoice matching
#[derive(Debug, Clone)]
pub struct EntityMatcher {
    config: MatcherConfig,
}

impl Default for EntityMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

impl EntityMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Total score (0-100) for one candidate
    pub fn score(
        &self,
        transaction: &BankTransaction,
        candidate: &MatchCandidate,
        contact: Option<&Contact>,
    ) -> u8 {
        let total = self.amount_points(transaction.amount(), candidate.amount) as u32
            + self.date_points(transaction.date.as_deref(), candidate.date.as_deref()) as u32
            + self.name_points(&transaction.description, contact) as u32;
        total.min(100) as u8
    }

    /// Points for the amount difference relative to the candidate amount
    pub fn amount_points(&self, txn_amount: f64, candidate_amount: f64) -> u8 {
        let txn_amount = txn_amount.abs();
        let candidate_amount = candidate_amount.abs();
        if txn_amount == 0.0 || candidate_amount == 0.0 {
            return 0;
        }

        let diff_percent = (txn_amount - candidate_amount).abs() / candidate_amount * 100.0;
        self.config
            .amount_tiers
            .iter()
            .find(|tier| diff_percent <= tier.percent + f64::EPSILON * 100.0)
            .map(|tier| tier.points)
            .unwrap_or(0)
    }

    /// Points for date proximity; missing or unparseable dates score nothing
    pub fn date_points(&self, txn_date: Option<&str>, candidate_date: Option<&str>) -> u8 {
        let (Some(txn_date), Some(candidate_date)) = (txn_date, candidate_date) else {
            return 0;
        };
        let (Ok(txn_date), Ok(candidate_date)) = (parse_date(txn_date), parse_date(candidate_date))
        else {
            return 0;
        };

        let days = (txn_date - candidate_date).num_days().abs();
        self.config
            .date_tiers
            .iter()
            .find(|tier| days <= tier.days)
            .map(|tier| tier.points)
            .unwrap_or(0)
    }

    /// Points for contact names appearing in the description
    pub fn name_points(&self, description: &str, contact: Option<&Contact>) -> u8 {
        let Some(contact) = contact else {
            return 0;
        };
        let description = description.to_lowercase();

        let hits = [Some(contact.display_name.as_str()), contact.company_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|name| !name.is_empty() && description.contains(&name.to_lowercase()))
            .count() as u32;

        (hits * self.config.name_points as u32).min(self.config.name_cap as u32) as u8
    }

    /// Best match for a transaction from a candidate pool.
    ///
    /// The pool must already be the one for the transaction's direction (bills
    /// for money out, invoices for money in). Candidates with equal scores keep
    /// their pool order, so the earlier candidate wins.
    pub fn match_entities(
        &self,
        transaction: &BankTransaction,
        pool: &[MatchCandidate],
        contacts: &[Contact],
    ) -> Option<MatchResult> {
        let direction = transaction.direction()?;
        let contacts_by_id: HashMap<i64, &Contact> = contacts.iter().map(|c| (c.id, c)).collect();

        let mut scored: Vec<ScoredMatch> = pool
            .iter()
            .filter_map(|candidate| {
                let contact = candidate
                    .contact_id
                    .and_then(|id| contacts_by_id.get(&id).copied());
                let score = self.score(transaction, candidate, contact);
                (score >= self.config.min_score).then_some(ScoredMatch {
                    counterpart_id: candidate.id,
                    contact_id: candidate.contact_id,
                    score,
                })
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.cmp(&a.score));

        let primary = scored.first()?.clone();
        debug!(
            transaction_id = transaction.id,
            counterpart_id = primary.counterpart_id,
            score = primary.score,
            candidates = scored.len(),
            "Matched bank transaction"
        );

        Some(MatchResult {
            counterpart_id: primary.counterpart_id,
            contact_id: primary.contact_id,
            score: primary.score,
            direction,
            all_matches: scored,
        })
    }

    /// Match every transaction against the pool for its direction
    pub fn match_all(
        &self,
        transactions: &[BankTransaction],
        bills: &[MatchCandidate],
        invoices: &[MatchCandidate],
        contacts: &[Contact],
    ) -> Vec<(i64, Option<MatchResult>)> {
        transactions
            .iter()
            .map(|txn| {
                let result = match txn.direction() {
                    Some(TransactionDirection::Expense) => {
                        self.match_entities(txn, bills, contacts)
                    }
                    Some(TransactionDirection::Income) => {
                        self.match_entities(txn, invoices, contacts)
                    }
                    None => None,
                };
                (txn.id, result)
            })
            .collect()
    }
}
