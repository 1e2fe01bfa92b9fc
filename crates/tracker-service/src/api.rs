//! HTTP handlers for the ingestion endpoint.

use crate::gate::IngestError;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use thiserror::Error;

/// Body returned when an event is accepted.
pub const ACCEPTED_BODY: &str = "Event processed successfully";
/// Body returned when the account is inactive.
pub const INACTIVE_BODY: &str = "Account is not active";
/// Body returned when the account cannot be validated.
pub const VALIDATION_FAILED_BODY: &str = "Failed to validate account";

/// Returns the first `data` value in `pairs`, or an empty string.
///
/// Repeated or unrelated keys never reject the request.
fn first_data(pairs: Vec<(String, String)>) -> String {
    pairs
        .into_iter()
        .find_map(|(key, value)| (key == "data").then_some(value))
        .unwrap_or_default()
}

/// API error type mapping to HTTP status codes.
///
/// Unknown accounts and store failures deliberately share one response so
/// callers cannot probe which account IDs exist.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("account is not active")]
    Inactive,
    #[error("failed to validate account")]
    ValidationFailed,
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Inactive(_) => ApiError::Inactive,
            IngestError::Lookup(_) | IngestError::Task(_) => ApiError::ValidationFailed,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Inactive => (StatusCode::BAD_REQUEST, INACTIVE_BODY),
            ApiError::ValidationFailed => (StatusCode::INTERNAL_SERVER_ERROR, VALIDATION_FAILED_BODY),
        };
        (status, body).into_response()
    }
}

/// Handler for `GET /{accountId}?data=...`.
pub async fn ingest_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(account_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<(StatusCode, &'static str), ApiError> {
    state.gate.handle(&account_id, first_data(pairs)).await?;
    Ok((StatusCode::OK, ACCEPTED_BODY))
}

/// Fallback for paths that do not name exactly one account.
///
/// No account id can be read from them, so they fail validation.
pub async fn unroutable_handler(uri: Uri) -> ApiError {
    tracing::warn!(path = %uri.path(), "rejecting request without a single account segment");
    ApiError::ValidationFailed
}
