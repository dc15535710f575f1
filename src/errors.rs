//! Error taxonomy
//!
//! Maps the handful of failure kinds a handler can report to the exact
//! status code and body shape the HTTP surface promises. This is a set of
//! *kinds*, not an open-ended error hierarchy — every handler failure in
//! this API is one of these.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request")]
    BadRequest,
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("precondition failed")]
    PreconditionFailed,
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST.into_response(),
            ApiError::Unauthorized => {
                let mut resp = StatusCode::UNAUTHORIZED.into_response();
                resp.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(r#"Basic realm="Restricted Area""#),
                );
                resp
            }
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::PreconditionFailed => StatusCode::PRECONDITION_FAILED.into_response(),
            ApiError::BackendUnavailable(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({ "error": message })))
                    .into_response()
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "unhandled handler error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
