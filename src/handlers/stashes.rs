//! Ad-hoc key/value stashes, addressed by free-form path.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::errors::{ApiError, ApiResult};
use crate::models::StashEntry;
use crate::pagination::{paginate, parse_query_usize};
use crate::registry::Registry;
use crate::responses::created;
use crate::AppState;
use std::sync::Arc;

fn stash_key(path: &str) -> String {
    format!("stash:{}", path)
}

/// Detaches the `srem` repair (I5) so the read path never blocks on it.
fn self_repair(set_key: &str, member: &str, registry: Arc<dyn Registry>) {
    let set_key = set_key.to_string();
    let member = member.to_string();
    tokio::spawn(async move {
        if let Err(err) = registry.srem(&set_key, &member).await {
            tracing::warn!(set = %set_key, member = %member, error = %err, "self-repair srem failed");
        }
    });
}

pub async fn put(State(state): State<AppState>, Path(path): Path<String>, body: axum::body::Bytes) -> ApiResult<Response> {
    let content: Value = serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest)?;
    state.registry.set(&stash_key(&path), &content.to_string()).await?;
    state.registry.sadd("stashes", &path).await?;
    Ok(created(json!({ "path": path })))
}

pub async fn get(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult<Response> {
    let raw = state.registry.get(&stash_key(&path)).await?;
    match raw.and_then(|r| serde_json::from_str::<Value>(&r).ok()) {
        Some(value) => Ok(Json(value).into_response()),
        None => Err(ApiError::NotFound),
    }
}

pub async fn delete(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult<Response> {
    if state.registry.get(&stash_key(&path)).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    state.registry.srem("stashes", &path).await?;
    state.registry.del(&stash_key(&path)).await?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

pub async fn list(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> ApiResult<Response> {
    let paths = state.registry.smembers("stashes").await?;

    let mut entries = Vec::new();
    for path in paths {
        let raw = state.registry.get(&stash_key(&path)).await?;
        match raw.and_then(|r| serde_json::from_str::<Value>(&r).ok()) {
            Some(content) => {
                let expire = state.registry.ttl(&stash_key(&path)).await.unwrap_or(-1);
                entries.push(StashEntry { path, content, expire });
            }
            None => {
                self_repair("stashes", &path, state.registry.clone());
            }
        }
    }

    let (page, pagination) = paginate(
        &entries,
        parse_query_usize(&params, "limit"),
        parse_query_usize(&params, "offset"),
    );

    let mut response = Json(page).into_response();
    if let Some(info) = pagination {
        if let Ok(header) = axum::http::HeaderValue::from_str(&serde_json::to_string(&info).unwrap()) {
            response
                .headers_mut()
                .insert(axum::http::HeaderName::from_static("x-pagination"), header);
        }
    }
    Ok(response)
}

pub async fn create(State(state): State<AppState>, body: axum::body::Bytes) -> ApiResult<Response> {
    let request: Value = serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest)?;
    let path = request.get("path").and_then(Value::as_str).ok_or(ApiError::BadRequest)?.to_string();
    let content = request.get("content").filter(|v| v.is_object()).ok_or(ApiError::BadRequest)?;

    let key = stash_key(&path);
    state.registry.set(&key, &content.to_string()).await?;
    state.registry.sadd("stashes", &path).await?;

    if let Some(expire) = request.get("expire").and_then(Value::as_i64) {
        state.registry.expire(&key, expire).await?;
    }

    Ok(created(json!({ "path": path })))
}
