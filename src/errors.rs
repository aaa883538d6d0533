use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("segment not found: {0}")]
    SegmentNotFound(String),

    #[error("no capacity left on segment {0}")]
    CapacityExhausted(String),

    #[error("reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::StorageUnavailable(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTemplate(_) => StatusCode::BAD_REQUEST,
            AppError::SegmentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::CapacityExhausted(_) => StatusCode::CONFLICT,
            AppError::ReservationNotFound(_) => StatusCode::NOT_FOUND,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
