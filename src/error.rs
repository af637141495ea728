use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::services::{
    api_client::ApiError, downloads::DownloadError, token_store::StoreError,
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Session error: {0}")]
    Session(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self, "Request failed");

        let (status, message) = match self {
            AppError::Api(ApiError::NotFound) => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Api(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Session(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Template(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to render page".to_string(),
            ),
            AppError::Download(DownloadError::Empty) => {
                (StatusCode::NOT_FOUND, "Nothing to download".to_string())
            }
            AppError::Download(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, message).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
