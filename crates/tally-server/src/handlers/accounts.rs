//! Chart of accounts handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};
use serde::Deserialize;

use super::read_json;
use crate::{get_actor, AppError, AppState, SuccessResponse};
use tally_core::models::{AccountType, ChartAccount, NewChartAccount};

/// Request body for creating an account
#[derive(Debug, Deserialize)]
pub struct CreateChartAccountRequest {
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub account_type: Option<String>,
}

/// GET /api/clients/:client_id/accounts - List a client's chart of accounts
pub async fn list_chart_accounts(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<Json<Vec<ChartAccount>>, AppError> {
    Ok(Json(state.db.list_chart_accounts(&client_id)?))
}

/// POST /api/clients/:client_id/accounts - Add an account to the chart
pub async fn create_chart_account(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    request: Request,
) -> Result<Json<ChartAccount>, AppError> {
    let actor = get_actor(request.headers());
    let req: CreateChartAccountRequest = read_json(request, 1024 * 10).await?;

    let account_type: AccountType = match req.account_type.as_deref() {
        Some(t) => t.parse().map_err(|e: String| AppError::bad_request(&e))?,
        None => AccountType::default(),
    };

    let account = state.db.create_chart_account(
        &client_id,
        &NewChartAccount {
            number: req.number,
            name: req.name,
            account_type,
        },
    )?;

    state.db.log_audit(
        &actor,
        "create",
        Some("chart_account"),
        Some(account.id),
        Some(&format!(
            "client={}, number={}, name={}",
            client_id, account.number, account.name
        )),
    )?;

    Ok(Json(account))
}

/// DELETE /api/clients/:client_id/accounts/:id - Remove an unused account
pub async fn delete_chart_account(
    State(state): State<Arc<AppState>>,
    Path((client_id, id)): Path<(String, i64)>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let actor = get_actor(request.headers());

    if !state.db.delete_chart_account(&client_id, id)? {
        return Err(AppError::not_found(&format!("Account {} not found", id)));
    }

    state.db.log_audit(
        &actor,
        "delete",
        Some("chart_account"),
        Some(id),
        Some(&format!("client={}", client_id)),
    )?;

    Ok(Json(SuccessResponse { success: true }))
}
