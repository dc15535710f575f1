//! Response shortcuts
//!
//! The handful of response shapes handlers build directly, as opposed to
//! the error shapes in [`crate::errors`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn created<T: Serialize>(body: T) -> Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

pub fn accepted<T: Serialize>(body: T) -> Response {
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

/// `202 {"issued": <unix_seconds_now>}` — the canonical "this mutation was
/// queued, not yet applied" response used by every fire-and-forget handler.
pub fn issued() -> Response {
    (StatusCode::ACCEPTED, Json(json!({ "issued": now_unix() }))).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
