use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use coffeechat_types::api::ErrorBody;

/// Every failure a handler can report, one variant per HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Detail is logged, never sent to the client.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<coffeechat_db::Error> for ApiError {
    fn from(err: coffeechat_db::Error) -> Self {
        use coffeechat_db::Error as DbError;
        match err {
            DbError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            DbError::NotFound(_) => ApiError::NotFound(err.to_string()),
            DbError::Forbidden(msg) => ApiError::Forbidden(msg),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            DbError::Sqlite(_) | DbError::LockPoisoned => ApiError::Internal(err.to_string()),
        }
    }
}

/// Malformed or mistyped bodies are input errors like any failed field check.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!("Internal error: {}", detail);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        use coffeechat_db::Error as DbError;

        let cases = [
            (DbError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (DbError::NotFound("User"), StatusCode::NOT_FOUND),
            (DbError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (DbError::Conflict("dup".into()), StatusCode::CONFLICT),
            (DbError::LockPoisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = ApiError::Internal("disk I/O error at page 42".into());
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = ApiError::from(coffeechat_db::Error::NotFound("Review"));
        assert_eq!(err.to_string(), "Review not found");
    }
}
