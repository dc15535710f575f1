//! Event enumeration and resolution.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;

use crate::errors::{ApiError, ApiResult};
use crate::publish::resolve_event;
use crate::registry::Registry;
use crate::responses::{issued, now_unix};
use crate::AppState;

fn events_key(name: &str) -> String {
    format!("events:{}", name)
}

pub async fn list_all(State(state): State<AppState>) -> ApiResult<Response> {
    let clients = state.registry.smembers("clients").await?;
    let mut events = Vec::new();
    for client in clients {
        for (_, raw) in state.registry.hgetall(&events_key(&client)).await? {
            if let Ok(event) = serde_json::from_str::<Value>(&raw) {
                events.push(event);
            }
        }
    }
    Ok(Json(events).into_response())
}

pub async fn list_for_client(State(state): State<AppState>, Path(client): Path<String>) -> ApiResult<Response> {
    let events: Vec<Value> = state
        .registry
        .hgetall(&events_key(&client))
        .await?
        .into_iter()
        .filter_map(|(_, raw)| serde_json::from_str(&raw).ok())
        .collect();
    Ok(Json(events).into_response())
}

pub async fn get(State(state): State<AppState>, Path((client, check)): Path<(String, String)>) -> ApiResult<Response> {
    let event = find_event(state.registry.as_ref(), &client, &check).await?;
    Ok(Json(event).into_response())
}

pub async fn delete(State(state): State<AppState>, Path((client, check)): Path<(String, String)>) -> ApiResult<Response> {
    let event = find_event(state.registry.as_ref(), &client, &check).await?;
    resolve_event(state.transport.as_ref(), &event, now_unix()).await;
    Ok(issued())
}

pub async fn resolve(State(state): State<AppState>, body: axum::body::Bytes) -> ApiResult<Response> {
    let request: Value = serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest)?;
    let client = request.get("client").and_then(Value::as_str).ok_or(ApiError::BadRequest)?;
    let check = request.get("check").and_then(Value::as_str).ok_or(ApiError::BadRequest)?;

    let event = find_event(state.registry.as_ref(), client, check).await?;
    resolve_event(state.transport.as_ref(), &event, now_unix()).await;
    Ok(issued())
}

async fn find_event(registry: &dyn Registry, client: &str, check: &str) -> ApiResult<Value> {
    let raw = registry
        .hgetall(&events_key(client))
        .await?
        .into_iter()
        .find(|(field, _)| field == check)
        .map(|(_, raw)| raw);
    match raw.and_then(|r| serde_json::from_str::<Value>(&r).ok()) {
        Some(event) => Ok(event),
        None => Err(ApiError::NotFound),
    }
}
