//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod accounts;
pub mod audit;
pub mod imports;
pub mod journal;
pub mod matching;

// Re-export all handlers for use in router
pub use accounts::*;
pub use audit::*;
pub use imports::*;
pub use journal::*;
pub use matching::*;

use axum::extract::Request;
use serde::de::DeserializeOwned;

use crate::AppError;

/// Read a JSON body, answering 400 for unreadable or malformed input
pub(crate) async fn read_json<T: DeserializeOwned>(
    request: Request,
    limit: usize,
) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}
