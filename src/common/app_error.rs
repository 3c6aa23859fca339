use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use super::aliases::DieselError;

/// Envelope every handler answers with, errors included.
#[derive(Serialize, ToSchema, Debug)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    ForbiddenResource(String),

    #[error("{0} is unreachable")]
    ServiceUnreachable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenResource(_) => StatusCode::FORBIDDEN,
            AppError::ServiceUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound("Record".into()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                AppError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                AppError::BadRequest(info.message().to_string())
            }
            err => AppError::Other(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Other(err) => {
                tracing::error!(error = ?err, "Unhandled error");
                "Internal server error".to_string()
            }
            err => err.to_string(),
        };

        (
            status,
            Json(StdResponse::<(), String> {
                data: None,
                message: Some(message),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_variant_to_its_status() {
        let cases = [
            (AppError::NotFound("Table #4".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("occupied".into()), StatusCode::CONFLICT),
            (AppError::BadRequest("quantity".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("header".into()), StatusCode::UNAUTHORIZED),
            (AppError::ForbiddenResource("role".into()), StatusCode::FORBIDDEN),
            (
                AppError::ServiceUnreachable("Printer".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Other(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn diesel_not_found_becomes_not_found() {
        let err: AppError = DieselError::NotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn other_diesel_errors_become_internal() {
        let err: AppError = DieselError::RollbackTransaction.into();
        assert!(matches!(err, AppError::Other(_)));
    }

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(
            AppError::NotFound("Meal #12".into()).to_string(),
            "Meal #12 not found"
        );
    }
}
