//! Bank transaction matching handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::read_json;
use crate::{AppError, AppState};
use tally_core::models::{BankTransaction, Contact, MatchCandidate, MatchResult};

/// Request body for matching one transaction against a candidate pool
///
/// `pool` must hold bills for money out and invoices for money in.
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub transaction: BankTransaction,
    #[serde(default)]
    pub pool: Vec<MatchCandidate>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

/// Advisory match; `matched` is null below the score threshold
#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub transaction_id: i64,
    pub matched: Option<MatchResult>,
}

/// POST /api/match - Suggest the bill or invoice a bank transaction settles
pub async fn match_entities(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<MatchResponse>, AppError> {
    let req: MatchRequest = read_json(request, 1024 * 1024).await?;

    if req.transaction.direction().is_none() {
        return Err(AppError::bad_request(
            "Transaction needs exactly one of debit or credit",
        ));
    }

    let matched = state
        .matcher
        .match_entities(&req.transaction, &req.pool, &req.contacts);

    Ok(Json(MatchResponse {
        transaction_id: req.transaction.id,
        matched,
    }))
}
