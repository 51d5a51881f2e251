use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::borrow::Cow;

/// Category of a failed request, returned to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Unauthorized,
    Forbidden,
    Downstream,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Downstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Implemented by domain errors so handlers can turn them into responses.
pub trait Classify: std::fmt::Display {
    fn kind(&self) -> ErrorKind;
}

pub enum AppError {
    InternalServerError(anyhow::Error),
    Rejected(ErrorKind, Cow<'static, str>),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            success: bool,
            kind: ErrorKind,
            message: Cow<'static, str>,
        }

        match self {
            AppError::InternalServerError(err) => {
                tracing::error!(error = ?err, "request failed");
                AppError::new(ErrorKind::Downstream, "Internal Server Error").into_response()
            }
            AppError::Rejected(kind, message) => (
                kind.status(),
                Json(AppErrorResponse {
                    success: false,
                    kind,
                    message,
                }),
            )
                .into_response(),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> AppError {
        AppError::Rejected(kind, message.into())
    }

    /// Converts a domain error; downstream failures are logged and hidden.
    pub fn domain<E: Classify>(err: E) -> AppError {
        match err.kind() {
            ErrorKind::Downstream => {
                tracing::error!(error = %err, "downstream failure");
                AppError::new(ErrorKind::Downstream, "Something went wrong, please try again")
            }
            kind => AppError::new(kind, err.to_string()),
        }
    }
}
