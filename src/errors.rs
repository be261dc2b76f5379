use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// `Connection` and `Query` keep the store failures distinct and inspectable:
/// the first means no connection could be established (unreachable target,
/// bad credentials, TLS failure, pool acquire timeout), the second means the
/// connection was fine but the statement failed. Neither is retried.
#[derive(Debug)]
pub enum AppError {
    /// Invalid client input (missing field, malformed enum, bad number).
    BadRequest(String),
    /// Key or customer has no matching rows.
    NotFound(String),
    /// Duplicate key on create.
    Conflict(String),
    /// Could not establish a store connection.
    Connection(sqlx::Error),
    /// Connection established, statement failed.
    Query(sqlx::Error),
}

impl AppError {
    /// True when the underlying driver error is a unique-constraint
    /// violation (SQLSTATE 23505). The store's constraint is the
    /// authoritative duplicate-key signal; the create pre-check is only an
    /// early exit.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Query(sqlx::Error::Database(db)) => db.code().as_deref() == Some("23505"),
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Connection(e) => write!(f, "Store connection error: {}", e),
            AppError::Query(e) => write!(f, "Store query error: {}", e),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Client errors echo their message; store errors log the full driver
    /// detail and return a sanitized message so connection targets and
    /// credentials never reach the caller. Debug builds append the detail
    /// for local diagnosis.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Connection(e) => {
                tracing::error!("Store connection error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sanitized("Store connection failed", e),
                )
            }
            AppError::Query(e) => {
                tracing::error!("Store query error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sanitized("Store query failed", e),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

fn sanitized(label: &str, err: &sqlx::Error) -> String {
    if cfg!(debug_assertions) {
        format!("{}: {}", label, err)
    } else {
        label.to_string()
    }
}

impl From<sqlx::Error> for AppError {
    /// A bare driver error without classification is a statement failure;
    /// connection-establishment paths wrap explicitly with
    /// `AppError::Connection`.
    fn from(err: sqlx::Error) -> Self {
        AppError::Query(err)
    }
}
