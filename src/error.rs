use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Terminal failure of a webhook pipeline run. The carried detail is for the
/// log only; callers receive the generic text from [`RelayError::public_message`].
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("method {0} is not accepted, only POST")]
    BadMethod(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("callback acknowledgement failed: {0}")]
    CallbackFailed(String),
    #[error("dispatch to trigger failed: {0}")]
    DispatchFailed(String),
}

impl RelayError {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::BadMethod(_) => "bad_method",
            RelayError::MalformedPayload(_) => "malformed_payload",
            RelayError::Unauthorized(_) => "unauthorized",
            RelayError::CallbackFailed(_) => "callback_failed",
            RelayError::DispatchFailed(_) => "dispatch_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::BadMethod(_) => StatusCode::BAD_REQUEST,
            RelayError::MalformedPayload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::CallbackFailed(_) => StatusCode::UNAUTHORIZED,
            RelayError::DispatchFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            RelayError::BadMethod(_) => "Bad Request",
            RelayError::MalformedPayload(_) => "Internal Service Error",
            RelayError::Unauthorized(_) => "Unauthorized",
            RelayError::CallbackFailed(_) => "Request could not be validated",
            RelayError::DispatchFailed(_) => "Internal Service Error",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.public_message()).into_response()
    }
}
