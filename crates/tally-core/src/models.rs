//! Domain models for Tally

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Chart of accounts
// ============================================================================

/// An entry in a client's chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartAccount {
    pub id: i64,
    pub client_id: String,
    /// Account code, e.g. "1000"
    pub number: String,
    pub name: String,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

impl ChartAccount {
    /// "1000 Cash" style label used in listings and fuzzy comparison
    pub fn label(&self) -> String {
        format!("{} {}", self.number, self.name)
    }
}

/// A chart-of-accounts entry to be created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChartAccount {
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub account_type: AccountType,
}

/// Account classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    #[default]
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" | "assets" => Ok(Self::Asset),
            "liability" | "liabilities" => Ok(Self::Liability),
            "equity" => Ok(Self::Equity),
            "income" | "revenue" => Ok(Self::Income),
            "expense" | "expenses" => Ok(Self::Expense),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Extracted data
// ============================================================================

/// A raw row produced by the file parser. Never modified after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRow {
    pub account_ref: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub debit: f64,
    #[serde(default)]
    pub credit: f64,
    #[serde(default)]
    pub reference: Option<String>,
}

// ============================================================================
// Account resolution
// ============================================================================

/// How an extracted account reference was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Missing,
    Error,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Missing => "missing",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chart account that resembles an extracted reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarAccount {
    pub account: ChartAccount,
    /// Similarity percentage (0-100)
    pub similarity: u8,
}

/// Resolution result for one distinct account reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountAnalysis {
    pub account_ref: String,
    pub match_type: MatchType,
    pub matched_account: Option<ChartAccount>,
    /// 0-100
    pub confidence: u8,
    pub similar_accounts: Vec<SimilarAccount>,
    pub can_create: bool,
    pub transaction_count: usize,
    /// Whether the session applied this match without user confirmation
    #[serde(default)]
    pub auto_mapped: bool,
    /// Proposed action when the user has not decided yet
    pub default_action: MappingAction,
    /// Reason for an `error` analysis
    #[serde(default)]
    pub error: Option<String>,
}

/// Aggregate counts over a session's account analyses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_accounts: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub new_accounts_needed: usize,
    pub unresolvable_accounts: usize,
    /// Percentage of references matched to an existing account
    pub match_rate: u8,
    pub ready_to_import: bool,
}

// ============================================================================
// Mappings
// ============================================================================

/// What to do with rows carrying a given account reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingAction {
    Map,
    Create,
    Skip,
}

impl MappingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Create => "create",
            Self::Skip => "skip",
        }
    }
}

impl std::str::FromStr for MappingAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "map" => Ok(Self::Map),
            "create" => Ok(Self::Create),
            "skip" => Ok(Self::Skip),
            _ => Err(format!("Unknown mapping action: {}", s)),
        }
    }
}

impl std::fmt::Display for MappingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user or automatic decision for one account reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMapping {
    pub action: MappingAction,
    #[serde(default)]
    pub target_account_id: Option<i64>,
    #[serde(default)]
    pub notes: String,
}

impl AccountMapping {
    pub fn map_to(account_id: i64, notes: impl Into<String>) -> Self {
        Self {
            action: MappingAction::Map,
            target_account_id: Some(account_id),
            notes: notes.into(),
        }
    }

    pub fn create() -> Self {
        Self {
            action: MappingAction::Create,
            target_account_id: None,
            notes: String::new(),
        }
    }

    pub fn skip() -> Self {
        Self {
            action: MappingAction::Skip,
            target_account_id: None,
            notes: String::new(),
        }
    }
}

// ============================================================================
// Journal entries
// ============================================================================

/// A journal line awaiting validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalLineCandidate {
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub debit_amount: f64,
    #[serde(default)]
    pub credit_amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

impl JournalLineCandidate {
    pub fn debit(account_id: i64, amount: f64) -> Self {
        Self {
            account_id: Some(account_id),
            debit_amount: amount,
            ..Default::default()
        }
    }

    pub fn credit(account_id: i64, amount: f64) -> Self {
        Self {
            account_id: Some(account_id),
            credit_amount: amount,
            ..Default::default()
        }
    }
}

/// A journal entry awaiting validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryCandidate {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entry_date: String,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub lines: Vec<JournalLineCandidate>,
}

/// A committed journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: i64,
    pub entry_id: i64,
    pub account_id: i64,
    pub debit_amount: f64,
    pub credit_amount: f64,
    pub description: Option<String>,
    pub memo: Option<String>,
}

/// A committed journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub client_id: String,
    pub import_session_id: Option<i64>,
    pub description: String,
    pub entry_date: String,
    pub reference_number: Option<String>,
    pub lines: Vec<JournalLine>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Bill / invoice matching
// ============================================================================

/// A bank transaction already in the books
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: i64,
    /// Unparseable or missing dates score no date points
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Money in
    #[serde(default)]
    pub debit: f64,
    /// Money out
    #[serde(default)]
    pub credit: f64,
}

/// Which candidate pool a bank transaction is scored against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    /// Money in, matched against invoices
    Income,
    /// Money out, matched against bills
    Expense,
}

impl BankTransaction {
    pub fn direction(&self) -> Option<TransactionDirection> {
        if self.debit > 0.0 && self.credit == 0.0 {
            Some(TransactionDirection::Income)
        } else if self.credit > 0.0 && self.debit == 0.0 {
            Some(TransactionDirection::Expense)
        } else {
            None
        }
    }

    pub fn amount(&self) -> f64 {
        match self.direction() {
            Some(TransactionDirection::Income) => self.debit,
            Some(TransactionDirection::Expense) => self.credit,
            None => 0.0,
        }
    }
}

/// An outstanding bill or invoice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: i64,
    #[serde(default)]
    pub contact_id: Option<i64>,
    pub amount: f64,
    #[serde(default)]
    pub date: Option<String>,
}

/// A vendor or customer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub display_name: String,
    #[serde(default)]
    pub company_name: Option<String>,
}

/// One candidate that cleared the score threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub counterpart_id: i64,
    pub contact_id: Option<i64>,
    pub score: u8,
}

/// Advisory match of a bank transaction to a bill or invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub counterpart_id: i64,
    pub contact_id: Option<i64>,
    pub score: u8,
    pub direction: TransactionDirection,
    /// Every candidate above the threshold, best first (primary included)
    pub all_matches: Vec<ScoredMatch>,
}

// ============================================================================
// Import sessions
// ============================================================================

/// Import session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// Analyzed, waiting on account mappings
    #[default]
    Pending,
    /// Import loop running
    Processing,
    /// Every reference has a mapping; ready to import
    Matched,
    Completed,
    Failed,
    Cancelled,
    /// Rejected by the user or replaced by a newer upload
    Rejected,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Matched => "matched",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }

    /// Terminal sessions accept no further writes
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Rejected
        )
    }

    /// Active statuses count against the one-session-per-client limit
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Matched)
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "matched" => Ok(Self::Matched),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown import status: {}", s)),
        }
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a session is in the staged import flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportStage {
    /// Nothing uploaded yet. Sessions start at `Analyzing`; this is what
    /// progress reports for a client with no session.
    #[default]
    Upload,
    Analyzing,
    Analyzed,
    Mapping,
    Importing,
    Completed,
    Failed,
    Cancelled,
    Rejected,
}

impl ImportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::Mapping => "mapping",
            Self::Importing => "importing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }

    /// Stage a session lands in when it reaches a terminal status
    pub fn for_terminal(status: ImportStatus) -> Option<Self> {
        match status {
            ImportStatus::Completed => Some(Self::Completed),
            ImportStatus::Failed => Some(Self::Failed),
            ImportStatus::Cancelled => Some(Self::Cancelled),
            ImportStatus::Rejected => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::str::FromStr for ImportStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upload" => Ok(Self::Upload),
            "analyzing" => Ok(Self::Analyzing),
            "analyzed" => Ok(Self::Analyzed),
            "mapping" => Ok(Self::Mapping),
            "importing" => Ok(Self::Importing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Unknown import stage: {}", s)),
        }
    }
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An import session record tracking one file-import attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: i64,
    pub client_id: String,
    pub status: ImportStatus,
    pub stage: ImportStage,
    pub filename: Option<String>,
    /// SHA-256 of the extracted rows
    pub file_hash: String,
    pub row_count: i64,
    pub processed_count: i64,
    pub imported_count: i64,
    pub skipped_count: i64,
    pub accounts_created: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A new import session to be created
#[derive(Debug, Clone)]
pub struct NewImportSession {
    pub client_id: String,
    pub filename: Option<String>,
    pub file_hash: String,
    pub row_count: i64,
}

/// A row that did not make it into the books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// Zero-based position in the extracted data
    pub row_index: usize,
    pub account_ref: String,
    pub reason: String,
}

/// Outcome of the import loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub session_id: i64,
    pub status: ImportStatus,
    pub successful: usize,
    pub skipped: usize,
    pub accounts_created: usize,
    pub message: String,
    pub skipped_rows: Vec<SkippedRow>,
}

/// Result of analyzing an extracted file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResult {
    pub session_id: i64,
    /// True when an open session for the same file was picked up again
    pub resumed: bool,
    pub account_analysis: Vec<AccountAnalysis>,
    pub summary: ValidationSummary,
    pub extracted_data: Vec<ExtractedRow>,
}

/// Result of re-checking a session's references against the current chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountValidation {
    pub session_id: i64,
    pub account_analysis: Vec<AccountAnalysis>,
    pub summary: ValidationSummary,
}

/// Live progress of an import batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub session_id: i64,
    pub total: usize,
    /// Always `imported + skipped`
    pub processed: usize,
    pub imported: usize,
    pub skipped: usize,
    pub percent: u8,
    pub current_entry: Option<String>,
    pub start_time: DateTime<Utc>,
    /// Seconds, once at least one row has been processed
    pub estimated_time_remaining: Option<u64>,
    pub is_active: bool,
}

/// Answer to a progress poll; present even when nothing is running
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    /// Session status, or "none" when the client has no session
    pub status: String,
    /// `upload` when the client has no session
    pub stage: Option<ImportStage>,
    pub is_active: bool,
    pub total: usize,
    pub progress: usize,
    pub imported: usize,
    pub skipped: usize,
    pub percentage: u8,
    pub current_entry: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub estimated_time_remaining: Option<u64>,
    pub session_id: Option<i64>,
    pub error: Option<String>,
}

impl ImportProgress {
    pub fn none() -> Self {
        Self {
            status: "none".to_string(),
            stage: Some(ImportStage::Upload),
            is_active: false,
            total: 0,
            progress: 0,
            imported: 0,
            skipped: 0,
            percentage: 0,
            current_entry: None,
            start_time: None,
            estimated_time_remaining: None,
            session_id: None,
            error: None,
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub actor: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_status_roundtrip() {
        for status in [
            ImportStatus::Pending,
            ImportStatus::Processing,
            ImportStatus::Matched,
            ImportStatus::Completed,
            ImportStatus::Failed,
            ImportStatus::Cancelled,
            ImportStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<ImportStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<ImportStatus>().is_err());
    }

    #[test]
    fn test_terminal_and_active_are_disjoint() {
        assert!(ImportStatus::Processing.is_active());
        assert!(ImportStatus::Matched.is_active());
        assert!(!ImportStatus::Completed.is_active());
        assert!(ImportStatus::Rejected.is_terminal());
        assert!(!ImportStatus::Pending.is_terminal());
    }

    #[test]
    fn test_transaction_direction() {
        let income = BankTransaction {
            debit: 100.0,
            ..Default::default()
        };
        assert_eq!(income.direction(), Some(TransactionDirection::Income));
        assert_eq!(income.amount(), 100.0);

        let expense = BankTransaction {
            credit: 42.5,
            ..Default::default()
        };
        assert_eq!(expense.direction(), Some(TransactionDirection::Expense));

        let both = BankTransaction {
            debit: 1.0,
            credit: 1.0,
            ..Default::default()
        };
        assert_eq!(both.direction(), None);
        assert_eq!(both.amount(), 0.0);
    }

    #[test]
    fn test_account_type_aliases() {
        assert_eq!("Revenue".parse::<AccountType>().unwrap(), AccountType::Income);
        assert_eq!("assets".parse::<AccountType>().unwrap(), AccountType::Asset);
    }
}
