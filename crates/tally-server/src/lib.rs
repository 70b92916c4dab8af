//! Tally Web Server
//!
//! Axum-based REST API for general-ledger imports.
//!
//! - Staged imports per client (analyze, map, start, poll, cancel)
//! - Chart of accounts maintenance
//! - Journal entry validation and bank-to-bill matching
//! - Audit logging for every mutation
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tally_core::{Database, EntityMatcher, ImportManager, TallyConfig};

mod handlers;

/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum JSON body size for row and mapping payloads
pub const MAX_JSON_BODY: usize = 20 * 1024 * 1024;

/// Header carrying the acting user for audit entries
const USER_HEADER: &str = "x-user-email";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub imports: ImportManager,
    pub matcher: EntityMatcher,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(db: Database, tally_config: TallyConfig, config: ServerConfig) -> Self {
        Self {
            matcher: EntityMatcher::new(tally_config.matcher.clone()),
            imports: ImportManager::new(db.clone(), tally_config),
            db,
            config,
        }
    }
}

/// Acting user for audit logging, "anonymous" when the header is absent
pub fn get_actor(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(db: Database, tally_config: TallyConfig, config: ServerConfig) -> Router {
    let state = Arc::new(AppState::new(db, tally_config, config));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Chart of accounts
        .route(
            "/clients/:client_id/accounts",
            get(handlers::list_chart_accounts).post(handlers::create_chart_account),
        )
        .route(
            "/clients/:client_id/accounts/:id",
            axum::routing::delete(handlers::delete_chart_account),
        )
        // Imports
        .route(
            "/clients/:client_id/imports",
            get(handlers::list_imports).post(handlers::analyze_import),
        )
        .route(
            "/clients/:client_id/imports/upload",
            // Room for multipart framing around a full-size file
            post(handlers::upload_import)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024)),
        )
        .route(
            "/clients/:client_id/imports/progress",
            get(handlers::get_import_progress),
        )
        .route("/clients/:client_id/imports/:id", get(handlers::get_import))
        .route(
            "/clients/:client_id/imports/:id/validate",
            post(handlers::validate_import_accounts),
        )
        .route(
            "/clients/:client_id/imports/:id/mappings",
            put(handlers::update_import_mappings),
        )
        .route(
            "/clients/:client_id/imports/:id/start",
            post(handlers::start_import),
        )
        .route(
            "/clients/:client_id/imports/:id/cancel",
            post(handlers::cancel_import),
        )
        .route(
            "/clients/:client_id/imports/:id/reject",
            post(handlers::reject_import),
        )
        // Journal
        .route(
            "/clients/:client_id/journal-entries",
            get(handlers::list_journal_entries),
        )
        .route(
            "/journal-entries/validate",
            post(handlers::validate_journal_entry),
        )
        // Matching
        .route("/match", post(handlers::match_entities))
        // Audit
        .route("/audit", get(handlers::list_audit_log));

    let cors = if state.config.allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::HeaderName::from_static(USER_HEADER),
            ])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(
    db: Database,
    tally_config: TallyConfig,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    serve_with_config(db, tally_config, host, port, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    tally_config: TallyConfig,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    // Recover any imports that were interrupted by server restart
    match db.recover_stuck_imports() {
        Ok(count) if count > 0 => {
            warn!(
                "⚠️  Recovered {} stuck import(s) from previous server session",
                count
            );
            if let Err(e) = db.log_audit(
                "system",
                "recover_imports",
                Some("import_session"),
                None,
                Some(&format!("count={}", count)),
            ) {
                warn!("Failed to audit import recovery: {}", e);
            }
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Failed to recover stuck imports: {}", e);
        }
    }

    let app = create_router(db, tally_config, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Status for core errors the caller can act on; None means internal
fn client_status(err: &tally_core::Error) -> Option<StatusCode> {
    use tally_core::Error;

    match err {
        e if e.is_client_error() => Some(StatusCode::BAD_REQUEST),
        Error::Csv(_) => Some(StatusCode::BAD_REQUEST),
        Error::NotFound(_) => Some(StatusCode::NOT_FOUND),
        Error::SessionConflict { .. } | Error::StaleSession { .. } => Some(StatusCode::CONFLICT),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        if let Some(status) = err
            .downcast_ref::<tally_core::Error>()
            .and_then(client_status)
        {
            return Self {
                status,
                message: err.to_string(),
                internal: None,
            };
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
