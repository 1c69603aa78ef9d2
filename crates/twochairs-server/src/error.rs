use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use twochairs_engine::EngineError;

/// HTTP-facing wrapper around [`EngineError`].
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::RoundPending | EngineError::NothingToRetry => StatusCode::CONFLICT,
            EngineError::Gateway(_) => StatusCode::BAD_GATEWAY,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_client_error() {
            tracing::debug!(code = self.0.code(), error = %self.0, "request rejected");
        } else {
            tracing::error!(code = self.0.code(), error = %self.0, "request failed");
        }

        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.to_string(),
        };
        (status, Json(json!({ "error": body }))).into_response()
    }
}
