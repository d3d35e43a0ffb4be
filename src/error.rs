use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::store::StoreError;
use crate::utils::{error_codes, error_to_api_response};

/// 处理器错误，渲染为带错误码的 `ApiResponse`
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    UserExists,
    AuthFailed(String),
    PermissionDenied,
    NotFound(String),
    AiUnavailable(String),
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, i32, String) {
        match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR, msg.clone())
            }
            AppError::UserExists => (
                StatusCode::CONFLICT,
                error_codes::USER_EXISTS,
                "User already exists".to_string(),
            ),
            AppError::AuthFailed(msg) => {
                (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg.clone())
            }
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                error_codes::PERMISSION_DENIED,
                "Administrator access required".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg.clone()),
            AppError::AiUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_codes::AI_UNAVAILABLE,
                msg.clone(),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                msg.clone(),
            ),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AppError::UserExists,
            StoreError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            other => {
                tracing::error!("Store error: {}", other);
                AppError::Internal("Database error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = self.parts();
        (status, error_to_api_response::<()>(code, msg)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
