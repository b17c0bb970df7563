use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

// Request-level error taxonomy. Every handler fault funnels through here so
// the process never dies on a single request.
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    /// The extraction tool itself failed; carries its stderr verbatim.
    Extractor(String),
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal server error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Extractor(e) => {
                tracing::error!("Extractor error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e)
            }
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e),
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, e),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

// Lets handlers use `?` on anything convertible to anyhow::Error.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
