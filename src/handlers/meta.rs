//! `/info` and `/health` — the two endpoints exempt from the connectivity
//! gate, since their entire purpose is to report connectivity.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::collections::HashMap;

use crate::models::VERSION;
use crate::pagination::parse_query_usize;
use crate::responses::no_content;
use crate::AppState;

pub async fn info(State(state): State<AppState>) -> Response {
    let transport_connected = state.transport.connected().await;
    let redis_connected = state.registry.connected().await;

    let (keepalives, results) = if transport_connected {
        let keepalives = state.transport.stats("keepalives").await.unwrap_or_default();
        let results = state.transport.stats("results").await.unwrap_or_default();
        (
            json!({"messages": keepalives.messages, "consumers": keepalives.consumers}),
            json!({"messages": results.messages, "consumers": results.consumers}),
        )
    } else {
        (json!(null), json!(null))
    };

    axum::Json(json!({
        "sensu": {"version": VERSION},
        "transport": {
            "keepalives": keepalives,
            "results": results,
            "connected": transport_connected,
        },
        "redis": {"connected": redis_connected},
    }))
    .into_response()
}

pub async fn health(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let registry_ok = state.registry.connected().await;
    let transport_ok = state.transport.connected().await;
    if !registry_ok || !transport_ok {
        return axum::http::StatusCode::PRECONDITION_FAILED.into_response();
    }

    let min_consumers = parse_query_usize(&params, "consumers");
    let max_messages = parse_query_usize(&params, "messages");

    for queue in ["keepalives", "results"] {
        let Ok(stats) = state.transport.stats(queue).await else {
            return axum::http::StatusCode::PRECONDITION_FAILED.into_response();
        };
        if let Some(min) = min_consumers {
            if (stats.consumers as usize) < min {
                return axum::http::StatusCode::PRECONDITION_FAILED.into_response();
            }
        }
        if let Some(max) = max_messages {
            if (stats.messages as usize) > max {
                return axum::http::StatusCode::PRECONDITION_FAILED.into_response();
            }
        }
    }

    no_content()
}
