//! Import session handlers
//!
//! A client drives one import at a time:
//! analyze (JSON rows or CSV upload) → update mappings → start → poll progress.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::read_json;
use crate::{get_actor, AppError, AppState, MAX_JSON_BODY, MAX_UPLOAD_SIZE};
use tally_core::import::parse_rows;
use tally_core::models::{
    AccountMapping, AccountValidation, AnalyzeResult, ExtractedRow, ImportProgress, ImportSession,
    ImportSummary,
};

/// Request body for analyzing already-extracted rows
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub filename: Option<String>,
    pub rows: Vec<ExtractedRow>,
}

/// Request body for recording mapping decisions
#[derive(Debug, Deserialize)]
pub struct MappingsRequest {
    pub mappings: HashMap<String, AccountMapping>,
}

/// Request body for starting the import loop
#[derive(Debug, Default, Deserialize)]
pub struct StartImportRequest {
    #[serde(default)]
    pub mappings: HashMap<String, AccountMapping>,
    #[serde(default)]
    pub create_missing_accounts: bool,
}

/// Query parameters for session listings
#[derive(Debug, Deserialize)]
pub struct ImportListQuery {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    20
}

/// GET /api/clients/:client_id/imports - Recent import sessions
pub async fn list_imports(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    Query(params): Query<ImportListQuery>,
) -> Result<Json<Vec<ImportSession>>, AppError> {
    let limit = params.limit.clamp(1, 200);
    Ok(Json(state.db.list_import_sessions(&client_id, limit)?))
}

/// POST /api/clients/:client_id/imports - Analyze extracted rows
pub async fn analyze_import(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    request: Request,
) -> Result<Json<AnalyzeResult>, AppError> {
    let actor = get_actor(request.headers());
    let req: AnalyzeRequest = read_json(request, MAX_JSON_BODY).await?;

    analyze_core(&state, &actor, &client_id, req.filename, req.rows)
}

/// POST /api/clients/:client_id/imports/upload - Analyze a CSV upload
///
/// Expects multipart form with:
/// - file: general-ledger CSV (required, max 10MB)
pub async fn upload_import(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResult>, AppError> {
    let actor = get_actor(&headers);
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("Failed to read file data"))?;

        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::bad_request(&format!(
                "File too large. Maximum size is {} MB",
                MAX_UPLOAD_SIZE / 1024 / 1024
            )));
        }
        file_data = Some(bytes.to_vec());
    }

    let file_data = file_data.ok_or_else(|| AppError::bad_request("Missing file field"))?;
    let rows = parse_rows(file_data.as_slice())?;

    analyze_core(&state, &actor, &client_id, filename, rows)
}

fn analyze_core(
    state: &AppState,
    actor: &str,
    client_id: &str,
    filename: Option<String>,
    rows: Vec<ExtractedRow>,
) -> Result<Json<AnalyzeResult>, AppError> {
    let row_count = rows.len();
    let result = state
        .imports
        .analyze(client_id, filename.as_deref(), rows)?;

    state.db.log_audit(
        actor,
        if result.resumed { "resume" } else { "analyze" },
        Some("import_session"),
        Some(result.session_id),
        Some(&format!(
            "client={}, file={}, rows={}, accounts={}",
            client_id,
            filename.as_deref().unwrap_or("-"),
            row_count,
            result.summary.total_accounts
        )),
    )?;

    Ok(Json(result))
}

/// GET /api/clients/:client_id/imports/progress - Poll the latest import
pub async fn get_import_progress(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<Json<ImportProgress>, AppError> {
    Ok(Json(state.imports.progress(&client_id)?))
}

/// GET /api/clients/:client_id/imports/:id - Get one session
pub async fn get_import(
    State(state): State<Arc<AppState>>,
    Path((client_id, id)): Path<(String, i64)>,
) -> Result<Json<ImportSession>, AppError> {
    Ok(Json(state.imports.get_session(&client_id, id)?))
}

/// POST /api/clients/:client_id/imports/:id/validate - Re-check references
/// against the current chart
pub async fn validate_import_accounts(
    State(state): State<Arc<AppState>>,
    Path((client_id, id)): Path<(String, i64)>,
) -> Result<Json<AccountValidation>, AppError> {
    Ok(Json(state.imports.validate_accounts(&client_id, id)?))
}

/// PUT /api/clients/:client_id/imports/:id/mappings - Record mapping decisions
pub async fn update_import_mappings(
    State(state): State<Arc<AppState>>,
    Path((client_id, id)): Path<(String, i64)>,
    request: Request,
) -> Result<Json<ImportSession>, AppError> {
    let actor = get_actor(request.headers());
    let req: MappingsRequest = read_json(request, MAX_JSON_BODY).await?;

    let session = state.imports.apply_mappings(&client_id, id, &req.mappings)?;

    state.db.log_audit(
        &actor,
        "update_mappings",
        Some("import_session"),
        Some(id),
        Some(&format!(
            "client={}, mappings={}, status={}",
            client_id,
            req.mappings.len(),
            session.status
        )),
    )?;

    Ok(Json(session))
}

/// POST /api/clients/:client_id/imports/:id/start - Run the import
///
/// The row loop runs on the blocking pool; progress polls are answered
/// while it works.
pub async fn start_import(
    State(state): State<Arc<AppState>>,
    Path((client_id, id)): Path<(String, i64)>,
    request: Request,
) -> Result<Json<ImportSummary>, AppError> {
    let actor = get_actor(request.headers());
    let req: StartImportRequest = read_json(request, MAX_JSON_BODY).await?;

    state.db.log_audit(
        &actor,
        "start_import",
        Some("import_session"),
        Some(id),
        Some(&format!(
            "client={}, create_missing_accounts={}",
            client_id, req.create_missing_accounts
        )),
    )?;

    let imports = state.imports.clone();
    let loop_client = client_id.clone();
    let summary = tokio::task::spawn_blocking(move || {
        imports.start_import(&loop_client, id, &req.mappings, req.create_missing_accounts)
    })
    .await??;

    info!(
        client_id = %client_id,
        session_id = id,
        imported = summary.successful,
        skipped = summary.skipped,
        "Import request finished"
    );

    state.db.log_audit(
        &actor,
        "finish_import",
        Some("import_session"),
        Some(id),
        Some(&format!(
            "status={}, imported={}, skipped={}, accounts_created={}",
            summary.status, summary.successful, summary.skipped, summary.accounts_created
        )),
    )?;

    Ok(Json(summary))
}

/// POST /api/clients/:client_id/imports/:id/cancel - Stop an import
pub async fn cancel_import(
    State(state): State<Arc<AppState>>,
    Path((client_id, id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Json<ImportSession>, AppError> {
    let actor = get_actor(&headers);
    let session = state.imports.cancel(&client_id, id)?;

    state.db.log_audit(
        &actor,
        "cancel_import",
        Some("import_session"),
        Some(id),
        Some(&format!("client={}", client_id)),
    )?;

    Ok(Json(session))
}

/// POST /api/clients/:client_id/imports/:id/reject - Discard a session under review
pub async fn reject_import(
    State(state): State<Arc<AppState>>,
    Path((client_id, id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Json<ImportSession>, AppError> {
    let actor = get_actor(&headers);
    let session = state.imports.reject(&client_id, id)?;

    state.db.log_audit(
        &actor,
        "reject_import",
        Some("import_session"),
        Some(id),
        Some(&format!("client={}", client_id)),
    )?;

    Ok(Json(session))
}
