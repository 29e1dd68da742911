use axum::{ http::StatusCode, response::IntoResponse, Json };
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")] NotFound(String),

    #[error("Bad request: {0}")] BadRequest(String),

    #[error("Unauthorized: {0}")] Unauthorized(String),

    #[error("Internal server error")] InternalError(#[from] anyhow::Error),

    #[error("Validation error: {0}")] ValidationError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InternalError(_) =>
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_expected_status_codes() {
        let cases = [
            (AppError::NotFound("missing".to_string()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("bad".to_string()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("nope".to_string()), StatusCode::UNAUTHORIZED),
            (AppError::ValidationError("invalid".to_string()), StatusCode::BAD_REQUEST),
            (
                AppError::InternalError(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
