use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Failure of a request handler. Every variant maps to a 500: the dashboard
/// has no client-caused error states.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] nd_core::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
