//! Journal entry handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::read_json;
use crate::{AppError, AppState};
use tally_core::ledger::{self, ValidationError};
use tally_core::models::{JournalEntry, JournalEntryCandidate};

/// Query parameters for journal listings
#[derive(Debug, Deserialize)]
pub struct JournalQuery {
    /// Only entries committed by this import session
    pub import_session_id: Option<i64>,
}

/// Result of validating a candidate entry
#[derive(Debug, Serialize)]
pub struct JournalValidationResponse {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub total_debits: f64,
    pub total_credits: f64,
}

/// GET /api/clients/:client_id/journal-entries - Committed entries with lines
pub async fn list_journal_entries(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(params): Query<JournalQuery>,
) -> Result<Json<Vec<JournalEntry>>, AppError> {
    Ok(Json(
        state
            .db
            .list_journal_entries(&client_id, params.import_session_id)?,
    ))
}

/// POST /api/journal-entries/validate - Check a candidate without committing it
pub async fn validate_journal_entry(
    request: Request,
) -> Result<Json<JournalValidationResponse>, AppError> {
    let candidate: JournalEntryCandidate = read_json(request, 1024 * 256).await?;

    let errors = ledger::validate(&candidate);
    let (total_debits, total_credits) =
        ledger::totals(candidate.lines.iter().filter(|l| ledger::is_counting_line(l)));

    Ok(Json(JournalValidationResponse {
        valid: errors.is_empty(),
        errors,
        total_debits,
        total_credits,
    }))
}
