//! Account resolution
//!
//! Resolves a free-text account reference from an extracted file to an entry in
//! the client's chart of accounts. Resolution runs a fixed, ordered list of
//! strategies and the first one that produces a result wins:
//!
//! 1. `Malformed` - empty or unusable references become `error` analyses
//! 2. `Exact` - number, name or "number name" label equal after normalization
//! 3. `Fuzzy` - best edit-distance similarity at or above the configured floor
//! 4. `Missing` - nothing close enough; the account can be created
//!
//! Resolution is pure. Whether a result is applied without asking the user is
//! decided separately by [`apply_auto_accept`].

use std::cmp::Ordering;

use crate::config::ResolverConfig;
use crate::models::{AccountAnalysis, ChartAccount, MappingAction, MatchType, SimilarAccount};

/// Outcome of a single strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Error(String),
    Exact(ChartAccount),
    Fuzzy {
        account: ChartAccount,
        confidence: u8,
        similar: Vec<SimilarAccount>,
    },
    Missing {
        similar: Vec<SimilarAccount>,
    },
}

/// Resolution strategies in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Malformed,
    Exact,
    Fuzzy,
    Missing,
}

impl Strategy {
    pub const ORDER: [Strategy; 4] = [
        Strategy::Malformed,
        Strategy::Exact,
        Strategy::Fuzzy,
        Strategy::Missing,
    ];
}

/// Resolves account references against a chart of accounts
#[derive(Debug, Clone)]
pub struct AccountResolver {
    config: ResolverConfig,
}

impl AccountResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve one reference. Never fails: bad input yields an `error` analysis.
    pub fn resolve(&self, account_ref: &str, chart: &[ChartAccount]) -> AccountAnalysis {
        let normalized = normalize(account_ref);

        let resolution = Strategy::ORDER
            .iter()
            .find_map(|strategy| self.apply(*strategy, account_ref, &normalized, chart))
            .unwrap_or(Resolution::Missing {
                similar: Vec::new(),
            });

        build_analysis(account_ref, resolution)
    }

    fn apply(
        &self,
        strategy: Strategy,
        raw: &str,
        normalized: &str,
        chart: &[ChartAccount],
    ) -> Option<Resolution> {
        match strategy {
            Strategy::Malformed => self.check_malformed(raw, normalized).map(Resolution::Error),
            Strategy::Exact => find_exact(normalized, chart).map(Resolution::Exact),
            Strategy::Fuzzy => {
                let ranked = rank_by_similarity(normalized, chart);
                let floor = self.config.fuzzy_floor;
                let (best, score) = ranked.first().filter(|(_, score)| *score >= floor)?;
                let similar = ranked
                    .iter()
                    .skip(1)
                    .filter(|(_, score)| *score >= floor)
                    .take(self.config.max_similar)
                    .map(|(account, score)| SimilarAccount {
                        account: (*account).clone(),
                        similarity: *score,
                    })
                    .collect();
                Some(Resolution::Fuzzy {
                    account: (*best).clone(),
                    confidence: *score,
                    similar,
                })
            }
            Strategy::Missing => {
                // Below-floor hints so the user has somewhere to start
                let similar = rank_by_similarity(normalized, chart)
                    .into_iter()
                    .filter(|(_, score)| *score > 0)
                    .take(self.config.max_similar)
                    .map(|(account, score)| SimilarAccount {
                        account: account.clone(),
                        similarity: score,
                    })
                    .collect();
                Some(Resolution::Missing { similar })
            }
        }
    }

    fn check_malformed(&self, raw: &str, normalized: &str) -> Option<String> {
        if normalized.is_empty() {
            return Some("Account reference is empty".to_string());
        }
        if !normalized.chars().any(|c| c.is_alphanumeric()) {
            return Some(format!(
                "Account reference '{}' has no letters or digits",
                raw.trim()
            ));
        }
        if normalized.chars().count() > self.config.max_ref_length {
            return Some(format!(
                "Account reference is longer than {} characters",
                self.config.max_ref_length
            ));
        }
        None
    }
}

fn build_analysis(account_ref: &str, resolution: Resolution) -> AccountAnalysis {
    let mut analysis = AccountAnalysis {
        account_ref: account_ref.to_string(),
        match_type: MatchType::Missing,
        matched_account: None,
        confidence: 0,
        similar_accounts: Vec::new(),
        can_create: true,
        transaction_count: 0,
        auto_mapped: false,
        default_action: MappingAction::Create,
        error: None,
    };

    match resolution {
        Resolution::Error(message) => {
            analysis.match_type = MatchType::Error;
            analysis.can_create = false;
            analysis.default_action = MappingAction::Skip;
            analysis.error = Some(message);
        }
        Resolution::Exact(account) => {
            analysis.match_type = MatchType::Exact;
            analysis.confidence = 100;
            analysis.matched_account = Some(account);
            analysis.default_action = MappingAction::Map;
        }
        Resolution::Fuzzy {
            account,
            confidence,
            similar,
        } => {
            analysis.match_type = MatchType::Fuzzy;
            analysis.confidence = confidence;
            analysis.matched_account = Some(account);
            analysis.similar_accounts = similar;
            analysis.default_action = MappingAction::Map;
        }
        Resolution::Missing { similar } => {
            analysis.similar_accounts = similar;
        }
    }

    analysis
}

/// Decide whether an analysis is mapped without user confirmation.
///
/// Exact matches always are; fuzzy matches only above `auto_accept_confidence`.
/// Everything else needs the user, defaulting to `create` when possible.
pub fn apply_auto_accept(analysis: &mut AccountAnalysis, auto_accept_confidence: u8) {
    analysis.auto_mapped = match analysis.match_type {
        MatchType::Exact => true,
        MatchType::Fuzzy => analysis.confidence > auto_accept_confidence,
        MatchType::Missing | MatchType::Error => false,
    };

    analysis.default_action = if analysis.auto_mapped {
        MappingAction::Map
    } else if analysis.can_create {
        MappingAction::Create
    } else {
        MappingAction::Skip
    };
}

/// Trim, case-fold and collapse internal whitespace
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn comparison_keys(account: &ChartAccount) -> [String; 4] {
    [
        normalize(&account.number),
        normalize(&account.name),
        normalize(&account.label()),
        normalize(&format!("{} - {}", account.number, account.name)),
    ]
}

fn find_exact<'a>(normalized: &str, chart: &'a [ChartAccount]) -> Option<ChartAccount> {
    let mut hits: Vec<&'a ChartAccount> = chart
        .iter()
        .filter(|account| comparison_keys(account).iter().any(|k| k == normalized))
        .collect();
    hits.sort_by(|a, b| tie_break(a, b));
    hits.first().map(|a| (*a).clone())
}

/// Every account with its best similarity, highest first
fn rank_by_similarity<'a>(normalized: &str, chart: &'a [ChartAccount]) -> Vec<(&'a ChartAccount, u8)> {
    let mut ranked: Vec<(&ChartAccount, u8)> = chart
        .iter()
        .map(|account| {
            let best = comparison_keys(account)
                .iter()
                .map(|key| similarity(normalized, key))
                .max()
                .unwrap_or(0);
            (account, best)
        })
        .collect();

    ranked.sort_by(|(a, sa), (b, sb)| sb.cmp(sa).then_with(|| tie_break(a, b)));
    ranked
}

/// Equal scores go to the lower account number, then the lower id
fn tie_break(a: &ChartAccount, b: &ChartAccount) -> Ordering {
    a.number.cmp(&b.number).then(a.id.cmp(&b.id))
}

/// Similarity percentage from normalized Levenshtein distance
pub fn similarity(a: &str, b: &str) -> u8 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100;
    }
    let distance = levenshtein(a, b);
    let ratio = 1.0 - distance as f64 / max_len as f64;
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountType;
    use chrono::Utc;

    fn account(id: i64, number: &str, name: &str) -> ChartAccount {
        ChartAccount {
            id,
            client_id: "acme".to_string(),
            number: number.to_string(),
            name: name.to_string(),
            account_type: AccountType::Expense,
            created_at: Utc::now(),
        }
    }

    fn chart() -> Vec<ChartAccount> {
        vec![
            account(1, "1000", "Cash"),
            account(2, "1200", "Accounts Receivable"),
            account(3, "6100", "Office Supplies"),
            account(4, "6200", "Rent Expense"),
            account(5, "6300", "Travel"),
        ]
    }

    fn resolver() -> AccountResolver {
        AccountResolver::new(ResolverConfig::default())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Office   SUPPLIES "), "office supplies");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_exact_match_by_number() {
        let analysis = resolver().resolve("1000", &chart());
        assert_eq!(analysis.match_type, MatchType::Exact);
        assert_eq!(analysis.confidence, 100);
        assert_eq!(analysis.matched_account.unwrap().id, 1);
    }

    #[test]
    fn test_exact_match_by_name_is_case_insensitive() {
        let analysis = resolver().resolve("  rent   expense ", &chart());
        assert_eq!(analysis.match_type, MatchType::Exact);
        assert_eq!(analysis.matched_account.unwrap().number, "6200");
    }

    #[test]
    fn test_exact_match_by_label() {
        let analysis = resolver().resolve("6300 - Travel", &chart());
        assert_eq!(analysis.match_type, MatchType::Exact);
        assert_eq!(analysis.matched_account.unwrap().id, 5);
    }

    #[test]
    fn test_fuzzy_match_typo() {
        let analysis = resolver().resolve("Office Suplies", &chart());
        assert_eq!(analysis.match_type, MatchType::Fuzzy);
        assert_eq!(analysis.confidence, 93);
        assert_eq!(analysis.matched_account.unwrap().id, 3);
    }

    #[test]
    fn test_missing_when_below_floor() {
        let analysis = resolver().resolve("Marketing", &chart());
        assert_eq!(analysis.match_type, MatchType::Missing);
        assert!(analysis.can_create);
        assert!(analysis.matched_account.is_none());
        assert!(analysis.similar_accounts.len() <= 5);
        assert_eq!(analysis.default_action, MappingAction::Create);
    }

    #[test]
    fn test_floor_is_configurable() {
        let strict = AccountResolver::new(ResolverConfig {
            fuzzy_floor: 95,
            auto_accept_confidence: 95,
            ..ResolverConfig::default()
        });
        let analysis = strict.resolve("Office Suplies", &chart());
        assert_eq!(analysis.match_type, MatchType::Missing);
    }

    #[test]
    fn test_malformed_references() {
        for bad in ["", "   ", "---", "***"] {
            let analysis = resolver().resolve(bad, &chart());
            assert_eq!(analysis.match_type, MatchType::Error, "ref {:?}", bad);
            assert!(!analysis.can_create);
            assert!(analysis.error.is_some());
        }

        let long = "x".repeat(200);
        assert_eq!(resolver().resolve(&long, &chart()).match_type, MatchType::Error);
    }

    #[test]
    fn test_empty_chart_is_missing() {
        let analysis = resolver().resolve("Cash", &[]);
        assert_eq!(analysis.match_type, MatchType::Missing);
        assert!(analysis.similar_accounts.is_empty());
    }

    #[test]
    fn test_tie_break_prefers_lower_number() {
        let chart = vec![account(9, "7000", "Meals"), account(8, "5000", "Meals")];
        let analysis = resolver().resolve("Meals", &chart);
        assert_eq!(analysis.matched_account.unwrap().number, "5000");
    }

    #[test]
    fn test_similar_accounts_exclude_primary() {
        let chart = vec![
            account(1, "6100", "Office Supplies"),
            account(2, "6110", "Office Supply Returns"),
            account(3, "6120", "Office Suppliers"),
        ];
        let analysis = resolver().resolve("Office Supplie", &chart);
        assert_eq!(analysis.match_type, MatchType::Fuzzy);
        let primary = analysis.matched_account.unwrap().id;
        assert!(analysis
            .similar_accounts
            .iter()
            .all(|s| s.account.id != primary));
        assert!(analysis
            .similar_accounts
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_auto_accept_policy() {
        let mut exact = resolver().resolve("1000", &chart());
        apply_auto_accept(&mut exact, 90);
        assert!(exact.auto_mapped);

        let mut fuzzy = resolver().resolve("Office Suplies", &chart());
        apply_auto_accept(&mut fuzzy, 90);
        assert!(fuzzy.auto_mapped, "93 > 90 should auto-map");

        // Same match with a stricter policy falls back to the user, defaulting to create
        let mut fuzzy = resolver().resolve("Office Suplies", &chart());
        apply_auto_accept(&mut fuzzy, 93);
        assert!(!fuzzy.auto_mapped, "threshold is strict");
        assert_eq!(fuzzy.default_action, MappingAction::Create);

        let mut error = resolver().resolve("", &chart());
        apply_auto_accept(&mut error, 90);
        assert!(!error.auto_mapped);
        assert_eq!(error.default_action, MappingAction::Skip);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = resolver().resolve("Ofice Supples", &chart());
        let b = resolver().resolve("Ofice Supples", &chart());
        assert_eq!(a, b);
    }
}
