//! Check definitions and on-demand check requests.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

use crate::errors::{ApiError, ApiResult};
use crate::publish::spawn_check_request;
use crate::responses::{issued, now_unix};
use crate::AppState;

pub async fn list(State(state): State<AppState>) -> Response {
    Json(&state.settings.checks).into_response()
}

pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    let def = state.settings.checks.get(&name).ok_or(ApiError::NotFound)?;
    let mut value = serde_json::to_value(def).map_err(anyhow::Error::from)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("name".to_string(), Value::String(name));
    }
    Ok(Json(value).into_response())
}

pub async fn request(State(state): State<AppState>, body: axum::body::Bytes) -> ApiResult<Response> {
    let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(&body) else {
        return Err(ApiError::BadRequest);
    };
    let check_name = obj
        .get("check")
        .and_then(Value::as_str)
        .ok_or(ApiError::BadRequest)?
        .to_string();

    let definition = state.settings.checks.get(&check_name).ok_or(ApiError::NotFound)?;
    let mut payload = serde_json::to_value(definition).map_err(anyhow::Error::from)?;
    if let Some(obj_mut) = payload.as_object_mut() {
        obj_mut.insert("name".to_string(), Value::String(check_name));

        let subscribers = obj
            .get("subscribers")
            .cloned()
            .filter(Value::is_array)
            .or_else(|| obj_mut.get("subscribers").cloned())
            .unwrap_or_else(|| json!([]));
        obj_mut.insert("subscribers".to_string(), subscribers);
    }

    spawn_check_request(state.transport.clone(), payload, now_unix());

    Ok(issued())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowAll;
    use crate::registry::fake::FakeRegistry;
    use crate::settings::{CheckDefinition, Settings};
    use crate::transport::fake::FakeTransport;
    use axum::extract::{Path as AxPath, State as AxState};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn test_ctx() -> (AppState, Arc<FakeTransport>) {
        let mut checks = HashMap::new();
        checks.insert(
            "cpu".to_string(),
            CheckDefinition {
                command: Some("check-cpu.sh".to_string()),
                subscribers: Some(vec!["roles:web".to_string()]),
                interval: Some(60),
                extra: Default::default(),
            },
        );
        let transport = Arc::new(FakeTransport::new());
        let state = AppState {
            settings: Arc::new(Settings {
                bind: "0.0.0.0".into(),
                port: 4567,
                auth: None,
                cors: crate::settings::default_cors(),
                checks,
                redis_url: String::new(),
                amqp_url: String::new(),
            }),
            registry: Arc::new(FakeRegistry::new()),
            transport: transport.clone(),
            validator: Arc::new(AllowAll),
        };
        (state, transport)
    }

    #[tokio::test]
    async fn get_known_check() {
        let (state, _) = test_ctx();
        let resp = get(AxState(state), AxPath("cpu".to_string())).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn get_unknown_check_is_not_found() {
        let (state, _) = test_ctx();
        let err = get(AxState(state), AxPath("missing".to_string())).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn request_unknown_check_is_not_found() {
        let (state, _) = test_ctx();
        let body = axum::body::Bytes::from(r#"{"check": "missing"}"#);
        let err = request(AxState(state), body).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn request_overlays_subscribers_from_body() {
        let (state, transport) = test_ctx();
        let body = axum::body::Bytes::from(r#"{"check": "cpu", "subscribers": ["direct:hostA"]}"#);
        let resp = request(AxState(state), body).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::ACCEPTED);

        // publishing is detached; give the spawned task a chance to run
        for _ in 0..50 {
            if !transport.published().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].routing_key, "direct:hostA");
    }

    #[tokio::test]
    async fn request_inherits_subscribers_from_definition_when_absent() {
        let (state, transport) = test_ctx();
        let body = axum::body::Bytes::from(r#"{"check": "cpu"}"#);
        request(AxState(state), body).await.unwrap();

        for _ in 0..50 {
            if !transport.published().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.published()[0].routing_key, "roles:web");
    }
}
