//! Request pipeline
//!
//! The cross-cutting *before* phase every request passes through ahead of
//! its handler: structured logging, `Content-Type`, CORS headers, the
//! connectivity gate, and HTTP Basic authentication. Implemented as an
//! Axum `from_fn_with_state` layer so it runs uniformly regardless of
//! route.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::AppState;

const EXEMPT_PATHS: [&str; 2] = ["/info", "/health"];

pub async fn pipeline(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();
    let remote = request
        .extensions()
        .get::<std::net::SocketAddr>()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    tracing::info!(
        method = %method,
        path = %path,
        remote = %remote,
        user_agent = %user_agent,
        uri = %uri,
        body = %String::from_utf8_lossy(&body_bytes),
        "request"
    );
    let request = Request::from_parts(parts, Body::from(body_bytes));

    if method == axum::http::Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors(&state, response.headers_mut());
        return response;
    }

    if !EXEMPT_PATHS.contains(&path.as_str()) {
        let registry_ok = state.registry.connected().await;
        let transport_ok = state.transport.connected().await;
        if !registry_ok || !transport_ok {
            let message = match (registry_ok, transport_ok) {
                (false, false) => "registry and transport are not connected",
                (false, true) => "registry is not connected",
                (true, false) => "transport is not connected",
                (true, true) => unreachable!(),
            };
            let mut response =
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({ "error": message })))
                    .into_response();
            apply_cors(&state, response.headers_mut());
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            return response;
        }
    }

    if !crate::auth::check_basic_auth(request.headers(), &state.settings.auth) {
        let mut response = crate::errors::ApiError::Unauthorized.into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        apply_cors(&state, response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    apply_cors(&state, response.headers_mut());
    response
}

fn apply_cors(state: &AppState, headers: &mut axum::http::HeaderMap) {
    for (key, value) in &state.settings.cors {
        let Ok(name) = HeaderName::try_from(format!("Access-Control-Allow-{}", key)) else {
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            continue;
        };
        headers.insert(name, value);
    }
}
