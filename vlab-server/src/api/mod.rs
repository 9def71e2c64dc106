//! HTTP request handlers
//!
//! Every endpoint returns the uniform `{isSuccess, message, data}`
//! envelope; errors are converted at this boundary and never propagate to
//! the transport layer as uncaught faults.

pub mod agents;
pub mod gallery;
pub mod health;
pub mod meetings;
pub mod sessions;
pub mod sse;
pub mod transcripts;
pub mod votes;

use crate::access;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;
use vlab_common::api::ApiResponse;
use vlab_common::db::models::Session;
use vlab_common::Error;

/// Handler result carrying the envelope on both paths
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Error wrapper mapping the common taxonomy onto HTTP statuses
pub struct ApiError(pub Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => {
                // Datastore/internal details stay in the log, not the wire
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body: ApiResponse<serde_json::Value> = ApiResponse::err(message);
        (status, Json(body)).into_response()
    }
}

/// Read gate: private sessions are indistinguishable from missing ones
pub(crate) fn require_read(
    session: &Session,
    caller: Option<&str>,
    entity: &str,
) -> Result<(), Error> {
    if access::can_read(session, caller) {
        Ok(())
    } else {
        Err(Error::NotFound(format!("{} not found", entity)))
    }
}

/// Write gate: non-owners of a public session get Unauthorized; for a
/// private session existence itself is not revealed
pub(crate) fn require_write(
    session: &Session,
    caller: Option<&str>,
    entity: &str,
) -> Result<(), Error> {
    if access::can_write(session, caller) {
        Ok(())
    } else if session.is_public {
        Err(Error::Unauthorized(format!(
            "Unauthorized to modify this {}",
            entity.to_lowercase()
        )))
    } else {
        Err(Error::NotFound(format!("{} not found", entity)))
    }
}
