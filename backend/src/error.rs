use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("System clock error: {0}")]
    Clock(#[from] std::time::SystemTimeError),
    #[error("Session token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        log::error!("Request failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
