use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::DbErr;
use policy::DenyReason;
use serde::Serialize;
use services::services::{auth::AuthError, error::ServiceError, image::ImageError};
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Unauthenticated.")]
    Unauthorized,
    #[error(transparent)]
    Forbidden(#[from] DenyReason),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Failed to upload file: {0}")]
    Multipart(#[from] MultipartError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ValidationError"),
            ApiError::Multipart(_) => (StatusCode::UNPROCESSABLE_ENTITY, "MultipartError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Database(DbErr::RecordNotFound(_)) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IoError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let message = match &self {
            ApiError::Database(DbErr::RecordNotFound(_)) => "Resource not found.".to_string(),
            _ if status_code.is_server_error() => "Server Error".to_string(),
            _ => self.to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        (status_code, Json(ErrorBody { message })).into_response()
    }
}

fn image_message(err: &ImageError) -> String {
    match err {
        ImageError::InvalidFormat => "The image field must be an image.".to_string(),
        ImageError::TooLarge(_, max) => format!(
            "The image field must not be greater than {} kilobytes.",
            max / 1024
        ),
        ImageError::Missing => err.to_string(),
        ImageError::Io(_) => "Failed to store the image.".to_string(),
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Io(io_err) => ApiError::Io(io_err),
            other => ApiError::Validation(image_message(&other)),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(db_err) => ApiError::Database(db_err),
            ServiceError::Forbidden(reason) => ApiError::Forbidden(reason),
            ServiceError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ServiceError::Validation(message) => ApiError::Validation(message),
            ServiceError::Image(image_err) => ApiError::from(image_err),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Database(db_err) => ApiError::Database(db_err),
            AuthError::Validation(message) => ApiError::Validation(message),
            AuthError::InvalidCredentials
            | AuthError::Deactivated
            | AuthError::InvalidRefreshToken => ApiError::Validation(err.to_string()),
            AuthError::Unauthenticated => ApiError::Unauthorized,
            AuthError::Token(_) | AuthError::Hash(_) | AuthError::HashTask(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::NotFound(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::Validation("bad".to_string()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden(DenyReason::NotMember).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Database(DbErr::RecordNotFound("task".to_string()))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_map_to_expected_http_statuses() {
        assert_eq!(
            ApiError::from(ServiceError::NotFound("Task")).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ServiceError::Forbidden(DenyReason::PmRoleRequired))
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ServiceError::Image(ImageError::TooLarge(6_000_000, 5_242_880)))
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(AuthError::Unauthenticated).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn oversize_image_message_reports_kilobytes() {
        let err = ApiError::from(ImageError::TooLarge(6_000_000, 5 * 1024 * 1024));
        assert_eq!(
            err.to_string(),
            "The image field must not be greater than 5120 kilobytes."
        );
    }
}
