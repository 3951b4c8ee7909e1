use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(&'static str),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            Self::Internal(error) => {
                error!("{:#}", error);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Maps a panicking handler onto the regular internal error response.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => panic
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_string(), |message| message.to_string()),
    };
    ApiError::Internal(anyhow::anyhow!("request handler panicked: {message}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::BadRequest("nope".into()).into_response().status(),
            StatusCode::BAD_REQUEST,
        );
        assert_eq!(ApiError::NotFound("gone").into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn panics_become_internal_errors() {
        assert_eq!(panic_response(Box::new("boom")).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            panic_response(Box::new("boom".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }
}
