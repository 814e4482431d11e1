//! HTTP error mapping.
//!
//! # Invariants
//! - Store failure details are logged, never written to the response body.
//! - Every error body has the shape `{"error": {kind, message, field}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde::Serialize;
use syllabus_core::db::DbError;
use syllabus_core::{
    ErrorKind, HierarchyServiceError, LoggingError, NodeField, STORE_FAILURE_MESSAGE,
};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing or malformed identity headers")]
    Unauthenticated,

    #[error("role `{0}` may not use the content editors")]
    Forbidden(String),

    #[error("unknown hierarchy level `{0}`")]
    UnknownLevel(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] HierarchyServiceError),

    /// Blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    TaskFailed(String),
}

#[derive(Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
    field: Option<NodeField>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated | Self::Forbidden(_) => ErrorKind::Authorization,
            Self::UnknownLevel(_) => ErrorKind::NotFound,
            Self::BadRequest(_) => ErrorKind::Validation,
            Self::Service(err) => err.kind(),
            Self::TaskFailed(_) => ErrorKind::Store,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => match self.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict | ErrorKind::HasChildren => StatusCode::CONFLICT,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        let (message, field) = match self {
            _ if self.kind() == ErrorKind::Store => (STORE_FAILURE_MESSAGE.to_string(), None),
            Self::Service(err) => (err.user_message(), err.field()),
            other => (other.to_string(), None),
        };
        ErrorBody {
            kind: self.kind(),
            message,
            field,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.kind() == ErrorKind::Store {
            error!(
                "event=http_error module=server status=error error_code=store_failed error={self}"
            );
        }
        (status, Json(ErrorEnvelope { error: self.body() })).into_response()
    }
}

/// Failures while bringing the server up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::Value;
    use syllabus_core::{
        HierarchyLevel, HierarchyServiceError, RepoError, Role, STORE_FAILURE_MESSAGE,
    };
    use uuid::Uuid;

    async fn body_json(err: AppError) -> (StatusCode, String, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let value = serde_json::from_str(&text).unwrap();
        (status, text, value)
    }

    #[test]
    fn service_errors_map_to_http_statuses() {
        let id = Uuid::new_v4();
        let cases = [
            (
                HierarchyServiceError::SlugTaken {
                    level: HierarchyLevel::Exam,
                    slug: "jee".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                HierarchyServiceError::HasChildren {
                    level: HierarchyLevel::Subject,
                    id,
                    child_count: 2,
                },
                StatusCode::CONFLICT,
            ),
            (
                HierarchyServiceError::PositionConflict {
                    level: HierarchyLevel::Chapter,
                    id,
                },
                StatusCode::CONFLICT,
            ),
            (
                HierarchyServiceError::NodeNotFound {
                    level: HierarchyLevel::Topic,
                    id,
                },
                StatusCode::NOT_FOUND,
            ),
            (
                HierarchyServiceError::AccessDenied(Role::parse("student")),
                StatusCode::FORBIDDEN,
            ),
            (
                HierarchyServiceError::Repo(RepoError::InvalidData("secret detail".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status(), expected);
        }
    }

    #[test]
    fn header_errors_are_unauthorized_or_forbidden() {
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("student".to_string()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::UnknownLevel("lessons".to_string()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn store_failure_body_hides_details() {
        let err = AppError::Service(HierarchyServiceError::Repo(RepoError::InvalidData(
            "secret detail".to_string(),
        )));
        let (status, text, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["kind"], "store");
        assert_eq!(body["error"]["message"], STORE_FAILURE_MESSAGE);
        assert!(body["error"]["field"].is_null());
        assert!(!text.contains("secret detail"));
    }

    #[tokio::test]
    async fn failed_store_task_is_reported_generically() {
        let (status, text, body) =
            body_json(AppError::TaskFailed("task 7 panicked".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], STORE_FAILURE_MESSAGE);
        assert!(!text.contains("panicked"));
    }
}
