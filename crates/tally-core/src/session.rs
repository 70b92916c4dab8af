//! Import session state machine
//!
//! Drives one file import per client through
//! `analyzing → analyzed | mapping → importing → completed | failed | cancelled | rejected`.
//!
//! - `analyze` resolves every distinct account reference and persists the
//!   session, its rows and any automatic mappings
//! - `apply_mappings` records the user's decisions for the rest
//! - `start_import` freezes the mappings and commits one balanced journal entry
//!   per row, skipping rows that fail validation or commit
//!
//! A client has at most one non-terminal session. Progress of the running loop
//! is published to a [`ProgressTracker`] for pollers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::config::TallyConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::import::{file_hash, looks_like_account_code, split_account_ref};
use crate::ledger;
use crate::models::{
    AccountAnalysis, AccountMapping, AccountType, AccountValidation, AnalyzeResult, ChartAccount,
    ExtractedRow, ImportProgress, ImportSession, ImportStage, ImportStatus, ImportSummary,
    JournalEntryCandidate, JournalLineCandidate, MappingAction, MatchType, NewChartAccount,
    NewImportSession, SkippedRow, ValidationSummary,
};
use crate::progress::{percent, ProgressTracker, RowOutcome};
use crate::resolver::{apply_auto_accept, normalize, AccountResolver};

/// Owns the import workflow for every client
#[derive(Clone)]
pub struct ImportManager {
    db: Database,
    config: TallyConfig,
    resolver: AccountResolver,
    progress: Arc<ProgressTracker>,
    // Serialises the check-then-act of session creation, import start and
    // termination
    transitions: Arc<Mutex<()>>,
}

/// Final account for every reference, or the reason its rows are skipped
type Targets = HashMap<String, std::result::Result<i64, String>>;

/// A running import loop: its cancellation flag and what it has done so far.
/// The counts are persisted on every way out of the loop.
struct LoopState {
    cancel: Arc<AtomicBool>,
    imported: usize,
    skipped: usize,
    accounts_created: usize,
}

impl LoopState {
    fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            cancel,
            imported: 0,
            skipped: 0,
            accounts_created: 0,
        }
    }

    fn processed(&self) -> usize {
        self.imported + self.skipped
    }
}

impl ImportManager {
    pub fn new(db: Database, config: TallyConfig) -> Self {
        let progress = Arc::new(ProgressTracker::new(&config.progress));
        Self {
            db,
            resolver: AccountResolver::new(config.resolver.clone()),
            config,
            progress,
            transitions: Arc::new(Mutex::new(())),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.progress
    }

    fn lock_transitions(&self) -> MutexGuard<'_, ()> {
        self.transitions.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Start (or resume) a session for an extracted file
    pub fn analyze(
        &self,
        client_id: &str,
        filename: Option<&str>,
        rows: Vec<ExtractedRow>,
    ) -> Result<AnalyzeResult> {
        if client_id.trim().is_empty() {
            return Err(Error::InvalidData("Client id is required".into()));
        }
        if rows.is_empty() {
            return Err(Error::Import("File contains no rows".into()));
        }

        let hash = file_hash(&rows);
        let _guard = self.lock_transitions();

        let active = self.db.active_import_sessions(client_id)?;
        if let Some(running) = active
            .iter()
            .find(|s| s.status == ImportStatus::Processing)
        {
            return Err(Error::SessionConflict {
                session_id: running.id,
            });
        }

        let mut resumed = None;
        for session in active {
            if resumed.is_none() && session.file_hash == hash {
                resumed = Some(session);
            } else {
                self.db.finish_import_session(
                    session.id,
                    ImportStatus::Rejected,
                    Some("Replaced by a newer upload"),
                )?;
                info!(client_id, session_id = session.id, "Replaced import session");
            }
        }

        if let Some(session) = resumed {
            info!(client_id, session_id = session.id, "Resuming import session");
            let validation = self.validate_accounts(client_id, session.id)?;
            return Ok(AnalyzeResult {
                session_id: session.id,
                resumed: true,
                account_analysis: validation.account_analysis,
                summary: validation.summary,
                extracted_data: rows,
            });
        }

        let session_id = self.db.create_import_session(&NewImportSession {
            client_id: client_id.to_string(),
            filename: filename.map(str::to_string),
            file_hash: hash,
            row_count: rows.len() as i64,
        })?;
        self.db.store_import_rows(session_id, &rows)?;

        let account_analysis = self.analyze_rows(client_id, &rows)?;
        for analysis in account_analysis.iter().filter(|a| a.auto_mapped) {
            if let Some(account) = &analysis.matched_account {
                let notes = match analysis.match_type {
                    MatchType::Fuzzy => format!("auto: fuzzy {}%", analysis.confidence),
                    _ => "auto: exact".to_string(),
                };
                self.db.upsert_account_mapping(
                    session_id,
                    &analysis.account_ref,
                    &AccountMapping::map_to(account.id, notes),
                )?;
            }
        }

        let all_auto = account_analysis.iter().all(|a| a.auto_mapped);
        let (status, stage) = if all_auto {
            (ImportStatus::Matched, ImportStage::Analyzed)
        } else {
            (ImportStatus::Pending, ImportStage::Mapping)
        };
        self.db.set_import_review_state(session_id, status, stage)?;

        let mapped: HashSet<&str> = account_analysis
            .iter()
            .filter(|a| a.auto_mapped)
            .map(|a| a.account_ref.as_str())
            .collect();
        let summary = summarize(&account_analysis, |r| mapped.contains(r));

        info!(
            client_id,
            session_id,
            rows = rows.len(),
            accounts = summary.total_accounts,
            match_rate = summary.match_rate,
            status = %status,
            "Analyzed import"
        );

        Ok(AnalyzeResult {
            session_id,
            resumed: false,
            account_analysis,
            summary,
            extracted_data: rows,
        })
    }

    /// Resolve the distinct references of some rows without touching any session
    pub fn preview(
        &self,
        client_id: &str,
        rows: &[ExtractedRow],
    ) -> Result<(Vec<AccountAnalysis>, ValidationSummary)> {
        let analysis = self.analyze_rows(client_id, rows)?;
        let summary = summarize(&analysis, |_| false);
        Ok((analysis, summary))
    }

    /// Re-run resolution for a session against the current chart.
    /// Reads only, so repeated calls agree until something changes.
    pub fn validate_accounts(&self, client_id: &str, session_id: i64) -> Result<AccountValidation> {
        let session = self.require_session(client_id, session_id)?;
        let rows = self.db.get_import_rows(session.id)?;
        let account_analysis = self.analyze_rows(client_id, &rows)?;

        let mappings = self.db.get_account_mappings(session.id)?;
        let summary = summarize(&account_analysis, |r| mappings.contains_key(r));

        Ok(AccountValidation {
            session_id: session.id,
            account_analysis,
            summary,
        })
    }

    fn analyze_rows(&self, client_id: &str, rows: &[ExtractedRow]) -> Result<Vec<AccountAnalysis>> {
        let chart = self.db.list_chart_accounts(client_id)?;
        let auto_accept = self.config.resolver.auto_accept_confidence;

        Ok(distinct_refs(rows)
            .into_iter()
            .map(|(account_ref, count)| {
                let mut analysis = self.resolver.resolve(&account_ref, &chart);
                apply_auto_accept(&mut analysis, auto_accept);
                analysis.transaction_count = count;
                analysis
            })
            .collect())
    }

    // ========================================================================
    // Mapping
    // ========================================================================

    /// Record mapping decisions for a session still under review
    pub fn apply_mappings(
        &self,
        client_id: &str,
        session_id: i64,
        mappings: &HashMap<String, AccountMapping>,
    ) -> Result<ImportSession> {
        let session = self.require_session(client_id, session_id)?;
        if !matches!(session.status, ImportStatus::Pending | ImportStatus::Matched) {
            return Err(stale(&session));
        }

        let rows = self.db.get_import_rows(session.id)?;
        let refs: Vec<String> = distinct_refs(&rows).into_iter().map(|(r, _)| r).collect();

        for (account_ref, mapping) in mappings {
            if !refs.iter().any(|r| r == account_ref.trim()) {
                return Err(Error::InvalidData(format!(
                    "Unknown account reference: {}",
                    account_ref
                )));
            }
            if mapping.action == MappingAction::Map {
                let target = mapping.target_account_id.ok_or_else(|| {
                    Error::InvalidData(format!(
                        "Mapping for '{}' needs a target account",
                        account_ref
                    ))
                })?;
                if self.db.get_client_chart_account(client_id, target)?.is_none() {
                    return Err(Error::InvalidData(format!(
                        "Account {} is not in the chart of accounts",
                        target
                    )));
                }
            }
        }

        for (account_ref, mapping) in mappings {
            self.db
                .upsert_account_mapping(session.id, account_ref.trim(), mapping)?;
        }

        let stored = self.db.get_account_mappings(session.id)?;
        let status = if refs.iter().all(|r| stored.contains_key(r)) {
            ImportStatus::Matched
        } else {
            ImportStatus::Pending
        };
        if !self
            .db
            .set_import_review_state(session.id, status, ImportStage::Mapping)?
        {
            return Err(stale(&self.require_session(client_id, session_id)?));
        }

        debug!(
            client_id,
            session_id,
            applied = mappings.len(),
            status = %status,
            "Applied account mappings"
        );
        self.require_session(client_id, session_id)
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Run the import loop for a session
    ///
    /// Rows that fail validation or commit are skipped; only store failures
    /// outside a row fail the session.
    pub fn start_import(
        &self,
        client_id: &str,
        session_id: i64,
        mappings: &HashMap<String, AccountMapping>,
        create_missing_accounts: bool,
    ) -> Result<ImportSummary> {
        let (rows, stored, cancel) = {
            let _guard = self.lock_transitions();

            let session = self.require_session(client_id, session_id)?;
            match session.status {
                ImportStatus::Processing => {
                    return Err(Error::SessionConflict {
                        session_id: session.id,
                    })
                }
                s if s.is_terminal() => return Err(stale(&session)),
                _ => {}
            }

            if !mappings.is_empty() {
                self.apply_mappings(client_id, session_id, mappings)?;
            }

            let rows = self.db.get_import_rows(session_id)?;
            let stored = self.db.get_account_mappings(session_id)?;
            let missing: Vec<String> = distinct_refs(&rows)
                .into_iter()
                .map(|(r, _)| r)
                .filter(|r| !stored.contains_key(r))
                .collect();
            if !missing.is_empty() {
                return Err(Error::MappingIncomplete(missing));
            }

            if !self.db.begin_import_processing(session_id)? {
                return Err(stale(&self.require_session(client_id, session_id)?));
            }
            // Tracked before the lock is released so a cancel always finds the flag
            let cancel = self.progress.begin(client_id, session_id, rows.len());
            (rows, stored, cancel)
        };

        info!(
            client_id,
            session_id,
            rows = rows.len(),
            create_missing_accounts,
            "Starting import"
        );

        let mut state = LoopState::new(cancel);
        let result = self.run_import(
            client_id,
            session_id,
            &rows,
            &stored,
            create_missing_accounts,
            &mut state,
        );

        if let Err(e) = &result {
            warn!(
                client_id,
                session_id,
                imported = state.imported,
                error = %e,
                "Import failed"
            );
            self.persist_final_counts(session_id, &state)?;
            self.db
                .finish_import_session(session_id, ImportStatus::Failed, Some(&e.to_string()))?;
            self.progress.finish(client_id, session_id);
        }
        result
    }

    fn persist_final_counts(&self, session_id: i64, state: &LoopState) -> Result<()> {
        self.db.record_final_import_counts(
            session_id,
            state.processed() as i64,
            state.imported as i64,
            state.skipped as i64,
            state.accounts_created as i64,
        )
    }

    fn run_import(
        &self,
        client_id: &str,
        session_id: i64,
        rows: &[ExtractedRow],
        mappings: &HashMap<String, AccountMapping>,
        create_missing_accounts: bool,
        state: &mut LoopState,
    ) -> Result<ImportSummary> {
        let contra = self.ensure_contra_account(client_id)?;
        let (targets, accounts_created) =
            self.resolve_targets(client_id, mappings, create_missing_accounts)?;
        state.accounts_created = accounts_created;

        let persist_every = self.config.progress.persist_every.max(1);
        let mut skipped_rows = Vec::new();
        let mut cancelled = false;

        for (index, row) in rows.iter().enumerate() {
            if state.cancel.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            let account_ref = row.account_ref.trim();
            let outcome = match targets.get(account_ref) {
                Some(Ok(account_id)) => {
                    match self.import_row(client_id, session_id, row, *account_id, contra.id) {
                        Ok(result) => result,
                        Err(e) => {
                            // Session left 'processing' after the flag was checked
                            debug!(session_id, row = index, error = %e, "Import stopped before commit");
                            cancelled = true;
                            break;
                        }
                    }
                }
                Some(Err(reason)) => Err(reason.clone()),
                None => Err("No mapping for account reference".to_string()),
            };

            let row_outcome = match outcome {
                Ok(entry_id) => {
                    debug!(session_id, row = index, entry_id, "Imported row");
                    state.imported += 1;
                    RowOutcome::Imported
                }
                Err(reason) => {
                    debug!(session_id, row = index, %reason, "Skipped row");
                    state.skipped += 1;
                    skipped_rows.push(SkippedRow {
                        row_index: index,
                        account_ref: account_ref.to_string(),
                        reason,
                    });
                    RowOutcome::Skipped
                }
            };

            self.progress
                .record_row(client_id, session_id, row_outcome, Some(row_label(index, row)));

            let processed = index + 1;
            if processed % persist_every == 0 && processed < rows.len() {
                let still_running = self.db.update_import_counts(
                    session_id,
                    processed as i64,
                    state.imported as i64,
                    state.skipped as i64,
                    state.accounts_created as i64,
                )?;
                if !still_running {
                    // Cancelled or rejected from elsewhere
                    cancelled = true;
                    break;
                }
            }
        }

        let (imported, skipped) = (state.imported, state.skipped);
        self.persist_final_counts(session_id, state)?;

        let (target, reason) = if cancelled {
            (ImportStatus::Cancelled, Some("Import cancelled by user"))
        } else {
            (ImportStatus::Completed, None)
        };
        let status = if self.db.finish_import_session(session_id, target, reason)? {
            target
        } else {
            // Terminal status set by someone else while the loop ran
            self.db
                .get_import_session(session_id)?
                .map(|s| s.status)
                .unwrap_or(ImportStatus::Cancelled)
        };
        self.progress.finish(client_id, session_id);

        let message = match status {
            ImportStatus::Completed if skipped == 0 => {
                format!("Imported {} entries", imported)
            }
            ImportStatus::Completed => format!(
                "Imported {} entries, skipped {} of {} rows",
                imported,
                skipped,
                rows.len()
            ),
            other => format!(
                "Import {} after {} entries ({} skipped)",
                other, imported, skipped
            ),
        };

        info!(
            client_id,
            session_id,
            imported,
            skipped,
            accounts_created,
            status = %status,
            "Import finished"
        );

        Ok(ImportSummary {
            session_id,
            status,
            successful: imported,
            skipped,
            accounts_created,
            message,
            skipped_rows,
        })
    }

    /// Build, validate and commit the two-line entry for one row
    ///
    /// The inner error is the reason the row is skipped. The outer error means
    /// the session is no longer accepting entries.
    fn import_row(
        &self,
        client_id: &str,
        session_id: i64,
        row: &ExtractedRow,
        account_id: i64,
        contra_id: i64,
    ) -> Result<std::result::Result<i64, String>> {
        let candidate = entry_for_row(row, account_id, contra_id);

        let errors = ledger::validate(&candidate);
        if !errors.is_empty() {
            return Ok(Err(errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")));
        }

        match self
            .db
            .commit_journal_entry(client_id, Some(session_id), &candidate)
        {
            Ok(entry_id) => Ok(Ok(entry_id)),
            Err(e @ Error::StaleSession { .. }) => Err(e),
            Err(e) => Ok(Err(e.to_string())),
        }
    }

    /// Turn mapping decisions into account ids, creating accounts as allowed
    fn resolve_targets(
        &self,
        client_id: &str,
        mappings: &HashMap<String, AccountMapping>,
        create_missing_accounts: bool,
    ) -> Result<(Targets, usize)> {
        let mut targets = Targets::new();
        let mut created = 0;

        // Sorted so created account numbers do not depend on hash order
        let mut refs: Vec<&String> = mappings.keys().collect();
        refs.sort();

        for account_ref in refs {
            let mapping = &mappings[account_ref];
            let target = match mapping.action {
                MappingAction::Map => mapping
                    .target_account_id
                    .ok_or_else(|| "Mapping has no target account".to_string()),
                MappingAction::Skip => Err("Skipped by mapping".to_string()),
                MappingAction::Create if !create_missing_accounts => {
                    Err("Account creation was not enabled for this import".to_string())
                }
                MappingAction::Create => {
                    let (account, is_new) = self.create_account_for_ref(client_id, account_ref)?;
                    if is_new {
                        created += 1;
                    }
                    Ok(account.id)
                }
            };
            targets.insert(account_ref.clone(), target);
        }

        Ok((targets, created))
    }

    fn create_account_for_ref(
        &self,
        client_id: &str,
        account_ref: &str,
    ) -> Result<(ChartAccount, bool)> {
        let (mut number, name) = split_account_ref(account_ref);
        let named = name.is_some();
        let name = name.unwrap_or_else(|| account_ref.trim().to_string());

        if let Some(code) = number.clone() {
            if let Some(existing) = self.db.find_chart_account_by_number(client_id, &code)? {
                // A bare number, or the same account under its own name
                if !named || normalize(&existing.name) == normalize(&name) {
                    return Ok((existing, false));
                }
                warn!(
                    client_id,
                    number = %code,
                    existing = %existing.name,
                    requested = %name,
                    "Account number already in use, creating under a free number"
                );
                number = None;
            }
        }

        let number = match number.filter(|n| looks_like_account_code(n)) {
            Some(n) => n,
            None => self
                .db
                .next_free_account_number(client_id, self.config.import.new_account_number_start)?,
        };

        let account = self.db.create_chart_account(
            client_id,
            &NewChartAccount {
                number,
                name,
                account_type: AccountType::default(),
            },
        )?;
        info!(
            client_id,
            account_id = account.id,
            number = %account.number,
            "Created account for import"
        );
        Ok((account, true))
    }

    /// The clearing account every imported row is balanced against
    fn ensure_contra_account(&self, client_id: &str) -> Result<ChartAccount> {
        let import = &self.config.import;
        if let Some(account) = self
            .db
            .find_chart_account_by_number(client_id, &import.contra_account_number)?
        {
            return Ok(account);
        }

        self.db.create_chart_account(
            client_id,
            &NewChartAccount {
                number: import.contra_account_number.clone(),
                name: import.contra_account_name.clone(),
                account_type: AccountType::Liability,
            },
        )
    }

    // ========================================================================
    // Termination and queries
    // ========================================================================

    /// Cancel a session. A running loop stops before its next row; entries
    /// already committed stay.
    pub fn cancel(&self, client_id: &str, session_id: i64) -> Result<ImportSession> {
        let _guard = self.lock_transitions();
        let session = self.require_session(client_id, session_id)?;
        if session.status.is_terminal() {
            return Err(stale(&session));
        }

        if !self.db.finish_import_session(
            session_id,
            ImportStatus::Cancelled,
            Some("Import cancelled by user"),
        )? {
            return Err(stale(&self.require_session(client_id, session_id)?));
        }
        // A running loop stops at its next row and finishes its own tracking
        let running = self.progress.request_cancel(client_id, session_id);
        if !running {
            self.progress.finish(client_id, session_id);
        }

        info!(client_id, session_id, running, "Import cancelled");
        self.require_session(client_id, session_id)
    }

    /// Reject a session that is still under review
    pub fn reject(&self, client_id: &str, session_id: i64) -> Result<ImportSession> {
        let _guard = self.lock_transitions();
        let session = self.require_session(client_id, session_id)?;
        match session.status {
            s if s.is_terminal() => return Err(stale(&session)),
            ImportStatus::Processing => {
                return Err(Error::InvalidData(
                    "Session is importing; cancel it instead".into(),
                ))
            }
            _ => {}
        }

        if !self.db.finish_import_session(
            session_id,
            ImportStatus::Rejected,
            Some("Rejected by user"),
        )? {
            return Err(stale(&self.require_session(client_id, session_id)?));
        }

        info!(client_id, session_id, "Import rejected");
        self.require_session(client_id, session_id)
    }

    /// A client's session by id
    pub fn get_session(&self, client_id: &str, session_id: i64) -> Result<ImportSession> {
        self.require_session(client_id, session_id)
    }

    /// What a poller needs to rebuild its view of the client's latest import
    pub fn progress(&self, client_id: &str) -> Result<ImportProgress> {
        let Some(session) = self.db.latest_import_session(client_id)? else {
            return Ok(ImportProgress::none());
        };

        let live = self
            .progress
            .snapshot(client_id)
            .filter(|p| p.session_id == session.id);

        let progress = match live {
            Some(record) => ImportProgress {
                status: session.status.to_string(),
                stage: Some(session.stage),
                is_active: record.is_active && session.status == ImportStatus::Processing,
                total: record.total,
                progress: record.processed,
                imported: record.imported,
                skipped: record.skipped,
                percentage: record.percent,
                current_entry: record.current_entry,
                start_time: Some(record.start_time),
                estimated_time_remaining: record.estimated_time_remaining,
                session_id: Some(session.id),
                error: session.error,
            },
            None => {
                let total = session.row_count.max(0) as usize;
                let processed = session.processed_count.max(0) as usize;
                ImportProgress {
                    status: session.status.to_string(),
                    stage: Some(session.stage),
                    is_active: session.status == ImportStatus::Processing,
                    total,
                    progress: processed,
                    imported: session.imported_count.max(0) as usize,
                    skipped: session.skipped_count.max(0) as usize,
                    percentage: if processed == 0 { 0 } else { percent(processed, total) },
                    current_entry: None,
                    start_time: session.started_at,
                    estimated_time_remaining: None,
                    session_id: Some(session.id),
                    error: session.error,
                }
            }
        };

        Ok(progress)
    }

    fn require_session(&self, client_id: &str, session_id: i64) -> Result<ImportSession> {
        self.db
            .get_client_import_session(client_id, session_id)?
            .ok_or_else(|| Error::NotFound(format!("Import session {}", session_id)))
    }
}

fn stale(session: &ImportSession) -> Error {
    Error::StaleSession {
        session_id: session.id,
        status: session.status.to_string(),
    }
}

/// Distinct trimmed references in first-seen order, with row counts
pub fn distinct_refs(rows: &[ExtractedRow]) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let account_ref = row.account_ref.trim();
        match index.get(account_ref) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(account_ref, order.len());
                order.push((account_ref.to_string(), 1));
            }
        }
    }

    order
}

/// Aggregate counts; `is_mapped` says whether a reference already has a decision
pub fn summarize(analysis: &[AccountAnalysis], is_mapped: impl Fn(&str) -> bool) -> ValidationSummary {
    let count = |t: MatchType| analysis.iter().filter(|a| a.match_type == t).count();
    let total = analysis.len();
    let exact = count(MatchType::Exact);
    let fuzzy = count(MatchType::Fuzzy);

    let match_rate = if total == 0 {
        100
    } else {
        (((exact + fuzzy) as f64 / total as f64) * 100.0).round() as u8
    };

    ValidationSummary {
        total_accounts: total,
        exact_matches: exact,
        fuzzy_matches: fuzzy,
        new_accounts_needed: count(MatchType::Missing),
        unresolvable_accounts: count(MatchType::Error),
        match_rate,
        ready_to_import: total > 0
            && analysis
                .iter()
                .all(|a| a.auto_mapped || is_mapped(&a.account_ref)),
    }
}

/// Two-line entry: the row against its account, balanced by the contra account
fn entry_for_row(row: &ExtractedRow, account_id: i64, contra_id: i64) -> JournalEntryCandidate {
    let description = if row.description.trim().is_empty() {
        format!("Import: {}", row.account_ref.trim())
    } else {
        row.description.trim().to_string()
    };

    JournalEntryCandidate {
        description: description.clone(),
        entry_date: row.date.clone(),
        reference_number: row.reference.clone(),
        lines: vec![
            JournalLineCandidate {
                account_id: Some(account_id),
                debit_amount: row.debit,
                credit_amount: row.credit,
                description: Some(description),
                memo: None,
            },
            JournalLineCandidate {
                account_id: Some(contra_id),
                debit_amount: row.credit,
                credit_amount: row.debit,
                description: None,
                memo: Some(format!("Offset for {}", row.account_ref.trim())),
            },
        ],
    }
}

fn row_label(index: usize, row: &ExtractedRow) -> String {
    let text = if row.description.trim().is_empty() {
        row.account_ref.trim()
    } else {
        row.description.trim()
    };
    format!("Row {}: {}", index + 1, text)
}
