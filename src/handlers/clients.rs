//! Client handlers: registration, enumeration, history, deletion.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Validator;
use crate::errors::{ApiError, ApiResult};
use crate::models::{ClientHistoryEntry, VERSION};
use crate::pagination::{paginate, parse_query_usize};
use crate::publish::resolve_event;
use crate::registry::Registry;
use crate::responses::{created, issued, now_unix};
use crate::transport::Transport;
use crate::AppState;

fn client_key(name: &str) -> String {
    format!("client:{}", name)
}

fn signature_key(name: &str) -> String {
    format!("client:{}:signature", name)
}

fn events_key(name: &str) -> String {
    format!("events:{}", name)
}

fn result_set_key(name: &str) -> String {
    format!("result:{}", name)
}

fn result_key(name: &str, check: &str) -> String {
    format!("result:{}:{}", name, check)
}

fn history_key(name: &str, check: &str) -> String {
    format!("history:{}:{}", name, check)
}

pub async fn create(State(state): State<AppState>, body: axum::body::Bytes) -> ApiResult<Response> {
    let Ok(Value::Object(mut obj)) = serde_json::from_slice::<Value>(&body) else {
        return Err(ApiError::BadRequest);
    };

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ApiError::BadRequest)?
        .to_string();

    let keepalives = obj.get("keepalives").cloned().unwrap_or(Value::Bool(false));
    obj.insert("keepalives".to_string(), keepalives);
    obj.insert("version".to_string(), Value::String(VERSION.to_string()));
    obj.insert("timestamp".to_string(), Value::from(now_unix()));

    let payload = Value::Object(obj);
    if !state.validator.valid(&payload) {
        return Err(ApiError::BadRequest);
    }

    state
        .registry
        .set(&client_key(&name), &payload.to_string())
        .await?;
    state.registry.sadd("clients", &name).await?;

    Ok(created(json!({ "name": name })))
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let names = state.registry.smembers("clients").await?;
    let (page, pagination) = paginate(
        &names,
        parse_query_usize(&params, "limit"),
        parse_query_usize(&params, "offset"),
    );

    let fetches = page.iter().map(|name| {
        let registry = state.registry.clone();
        let name = name.clone();
        async move {
            let raw = registry.get(&client_key(&name)).await.ok().flatten();
            (name, raw)
        }
    });
    let fetched = join_all(fetches).await;

    let mut clients = Vec::new();
    for (name, raw) in fetched {
        match raw.and_then(|r| serde_json::from_str::<Value>(&r).ok()) {
            Some(value) => clients.push(value),
            None => self_repair("clients", &name, state.registry.clone()),
        }
    }

    let mut response = Json(clients).into_response();
    if let Some(info) = pagination {
        if let Ok(header) = axum::http::HeaderValue::from_str(&serde_json::to_string(&info).unwrap()) {
            response
                .headers_mut()
                .insert(axum::http::HeaderName::from_static("x-pagination"), header);
        }
    }
    Ok(response)
}

pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    let raw = state.registry.get(&client_key(&name)).await?;
    match raw.and_then(|r| serde_json::from_str::<Value>(&r).ok()) {
        Some(value) => Ok(Json(value).into_response()),
        None => Err(ApiError::NotFound),
    }
}

pub async fn history(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    let checks = state.registry.smembers(&result_set_key(&name)).await?;

    let fetches = checks.iter().map(|check| {
        let registry = state.registry.clone();
        let name = name.clone();
        let check = check.clone();
        async move {
            let history = registry
                .lrange(&history_key(&name, &check), -21, -1)
                .await
                .unwrap_or_default();
            let result_raw = registry.get(&result_key(&name, &check)).await.ok().flatten();
            (check, history, result_raw)
        }
    });
    let fetched = join_all(fetches).await;

    let mut entries = Vec::new();
    for (check, history_raw, result_raw) in fetched {
        let history: Vec<i64> = history_raw.iter().filter_map(|s| s.parse().ok()).collect();
        let Some(result) = result_raw.and_then(|r| serde_json::from_str::<Value>(&r).ok()) else {
            continue;
        };
        if history.is_empty() {
            continue;
        }
        entries.push(ClientHistoryEntry {
            check,
            last_execution: crate::models::executed_of(&result),
            last_status: crate::models::status_of(&result),
            last_result: result,
            history,
        });
    }

    Ok(Json(entries).into_response())
}

pub async fn delete(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    if state.registry.get(&client_key(&name)).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let events = state.registry.hgetall(&events_key(&name)).await?;
    let now = now_unix();
    for (_, raw_event) in &events {
        if let Ok(event) = serde_json::from_str::<Value>(raw_event) {
            resolve_event(state.transport.as_ref(), &event, now).await;
        }
    }

    spawn_purge(name, state.registry.clone());

    Ok(issued())
}

fn self_repair(set_key: &str, member: &str, registry: Arc<dyn Registry>) {
    let set_key = set_key.to_string();
    let member = member.to_string();
    tokio::spawn(async move {
        if let Err(err) = registry.srem(&set_key, &member).await {
            tracing::warn!(set = %set_key, member = %member, error = %err, "self-repair srem failed");
        }
    });
}

/// The bounded probe/purge state machine: re-check `events:<name>` up to
/// five times, one second apart, before removing every key associated with
/// the client. Detached from the request that triggered it.
fn spawn_purge(name: String, registry: Arc<dyn Registry>) {
    tokio::spawn(async move {
        for attempt in 0..=5 {
            if attempt == 5 {
                break;
            }
            match registry.hgetall(&events_key(&name)).await {
                Ok(events) if events.is_empty() => break,
                Ok(_) => tokio::time::sleep(Duration::from_secs(1)).await,
                Err(err) => {
                    tracing::warn!(client = %name, error = %err, "purge probe failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        if let Err(err) = purge(&name, registry.as_ref()).await {
            tracing::error!(client = %name, error = %err, "client purge failed");
        }
    });
}

async fn purge(name: &str, registry: &dyn Registry) -> anyhow::Result<()> {
    registry.srem("clients", name).await?;
    registry.del(&client_key(name)).await?;
    registry.del(&signature_key(name)).await?;
    registry.del(&events_key(name)).await?;

    for check in registry.smembers(&result_set_key(name)).await? {
        registry.del(&result_key(name, &check)).await?;
        registry.del(&history_key(name, &check)).await?;
    }
    registry.del(&result_set_key(name)).await?;

    Ok(())
}
