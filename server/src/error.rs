use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{counter::StoreUnavailable, documents::DocumentError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    MalformedPayload(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden - You don't have permission.")]
    Forbidden,

    #[error("Not Found")]
    NotFound,

    #[error(transparent)]
    StoreUnavailable(#[from] StoreUnavailable),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::InternalError(error.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Document(DocumentError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Document(DocumentError::DuplicateId { .. }) => StatusCode::CONFLICT,
            AppError::Document(DocumentError::Corrupt { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {self}");
        }

        let body = json!({
            "errorMessage": self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
