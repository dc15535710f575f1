//! Check result ingestion and enumeration.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::errors::{ApiError, ApiResult};
use crate::models::ResultEntry;
use crate::publish::publish_check_result;
use crate::responses::{issued, now_unix};
use crate::validation::{read_data, FieldType, Rule};
use crate::AppState;

const NAME_SOURCE_PATTERN: &str = r"\A[\w.\-]+\z";
const INGEST_CLIENT: &str = "sensu-api";

static NAME_SOURCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_SOURCE_PATTERN).expect("valid validation regex"));

fn result_set_key(name: &str) -> String {
    format!("result:{}", name)
}

fn result_key(name: &str, check: &str) -> String {
    format!("result:{}:{}", name, check)
}

pub async fn create(State(state): State<AppState>, body: axum::body::Bytes) -> ApiResult<Response> {
    let rules = [
        Rule::new("name", FieldType::String).regex_compiled(&NAME_SOURCE_REGEX),
        Rule::new("output", FieldType::String),
        Rule::new("status", FieldType::Integer).nil_ok(),
        Rule::new("source", FieldType::String).nil_ok().regex_compiled(&NAME_SOURCE_REGEX),
    ];
    let Some(check) = read_data(&body, &rules) else {
        return Err(ApiError::BadRequest);
    };

    publish_check_result(state.transport.as_ref(), INGEST_CLIENT, Value::Object(check), now_unix()).await;
    Ok(issued())
}

pub async fn list_all(State(state): State<AppState>) -> ApiResult<Response> {
    let clients = state.registry.smembers("clients").await?;
    let mut entries = Vec::new();
    for client in clients {
        for check in state.registry.smembers(&result_set_key(&client)).await? {
            if let Some(raw) = state.registry.get(&result_key(&client, &check)).await? {
                if let Ok(parsed) = serde_json::from_str(&raw) {
                    entries.push(ResultEntry { client: client.clone(), check: parsed });
                }
            }
        }
    }
    Ok(Json(entries).into_response())
}

pub async fn list_for_client(State(state): State<AppState>, Path(client): Path<String>) -> ApiResult<Response> {
    let checks = state.registry.smembers(&result_set_key(&client)).await?;
    if checks.is_empty() {
        return Err(ApiError::NotFound);
    }

    let mut entries = Vec::new();
    for check in checks {
        if let Some(raw) = state.registry.get(&result_key(&client, &check)).await? {
            if let Ok(parsed) = serde_json::from_str(&raw) {
                entries.push(ResultEntry { client: client.clone(), check: parsed });
            }
        }
    }
    Ok(Json(entries).into_response())
}

pub async fn get(State(state): State<AppState>, Path((client, check)): Path<(String, String)>) -> ApiResult<Response> {
    let raw = state.registry.get(&result_key(&client, &check)).await?;
    match raw.and_then(|r| serde_json::from_str::<Value>(&r).ok()) {
        Some(value) => Ok(Json(value).into_response()),
        None => Err(ApiError::NotFound),
    }
}

pub async fn delete(State(state): State<AppState>, Path((client, check)): Path<(String, String)>) -> ApiResult<Response> {
    if state.registry.get(&result_key(&client, &check)).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    state.registry.srem(&result_set_key(&client), &check).await?;
    state.registry.del(&result_key(&client, &check)).await?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowAll;
    use crate::registry::fake::FakeRegistry;
    use crate::registry::Registry;
    use crate::settings::Settings;
    use crate::transport::fake::FakeTransport;
    use axum::extract::{Path as AxPath, State as AxState};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn test_ctx() -> (AppState, Arc<FakeRegistry>, Arc<FakeTransport>) {
        let registry = Arc::new(FakeRegistry::new());
        let transport = Arc::new(FakeTransport::new());
        let state = AppState {
            settings: Arc::new(Settings {
                bind: "0.0.0.0".into(),
                port: 4567,
                auth: None,
                cors: crate::settings::default_cors(),
                checks: HashMap::new(),
                redis_url: String::new(),
                amqp_url: String::new(),
            }),
            registry: registry.clone(),
            transport: transport.clone(),
            validator: Arc::new(AllowAll),
        };
        (state, registry, transport)
    }

    #[tokio::test]
    async fn create_rejects_bad_name() {
        let (state, _registry, _transport) = test_ctx();
        let body = axum::body::Bytes::from(r#"{"name": "bad name", "output": "ok"}"#);
        let err = create(AxState(state), body).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest));
    }

    #[tokio::test]
    async fn create_publishes_under_ingest_client() {
        let (state, _registry, transport) = test_ctx();
        let body = axum::body::Bytes::from(r#"{"name": "cpu_check", "output": "ok", "status": 1}"#);
        let resp = create(AxState(state), body).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::ACCEPTED);

        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload["client"], INGEST_CLIENT);
        assert_eq!(published[0].payload["check"]["status"], 1);
    }

    #[tokio::test]
    async fn list_for_client_is_not_found_when_empty() {
        let (state, _registry, _transport) = test_ctx();
        let err = list_for_client(AxState(state), AxPath("ghost".to_string())).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn get_and_delete_round_trip() {
        let (state, registry, _transport) = test_ctx();
        registry.sadd(&result_set_key("web-01"), "cpu").await.unwrap();
        registry
            .set(&result_key("web-01", "cpu"), &serde_json::json!({"status": 0}).to_string())
            .await
            .unwrap();

        let fetched = get(AxState(state.clone()), AxPath(("web-01".to_string(), "cpu".to_string())))
            .await
            .unwrap();
        assert_eq!(fetched.status(), axum::http::StatusCode::OK);

        let deleted = delete(AxState(state.clone()), AxPath(("web-01".to_string(), "cpu".to_string())))
            .await
            .unwrap();
        assert_eq!(deleted.status(), axum::http::StatusCode::NO_CONTENT);

        let err = get(AxState(state), AxPath(("web-01".to_string(), "cpu".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn delete_missing_result_is_not_found() {
        let (state, _registry, _transport) = test_ctx();
        let err = delete(AxState(state), AxPath(("web-01".to_string(), "cpu".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
