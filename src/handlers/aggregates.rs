//! Named aggregates of check results, grouped by client, by check, and by
//! severity-then-output.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ApiError, ApiResult};
use crate::models::{
    executed_of, status_of, AggregateCheckGroup, AggregateClientGroup, AggregateMember,
    AggregateSummary, Severity, SeverityCheckGroup, SeverityOutputGroup,
};
use crate::pagination::parse_query_i64;
use crate::registry::Registry;
use crate::AppState;

fn aggregate_key(name: &str) -> String {
    format!("aggregates:{}", name)
}

fn result_key(client: &str, check: &str) -> String {
    format!("result:{}:{}", client, check)
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

/// Reads every member of `aggregates:<name>`, self-repairing (I5) any member
/// whose referenced result no longer exists.
async fn members_with_results(
    registry: Arc<dyn Registry>,
    name: &str,
) -> anyhow::Result<Vec<(AggregateMember, Value)>> {
    let mut out = Vec::new();
    for raw in registry.smembers(&aggregate_key(name)).await? {
        let Some(member) = AggregateMember::parse(&raw) else {
            continue;
        };
        match registry.get(&result_key(&member.client, &member.check)).await? {
            Some(result) => {
                if let Ok(parsed) = serde_json::from_str(&result) {
                    out.push((member, parsed));
                }
            }
            None => {
                self_repair(&aggregate_key(name), &raw, registry.clone());
            }
        }
    }
    Ok(out)
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Response> {
    let names = state.registry.smembers("aggregates").await?;
    let body: Vec<Value> = names.into_iter().map(|name| serde_json::json!({ "name": name })).collect();
    Ok(Json(body).into_response())
}

pub async fn get(State(state): State<AppState>, Path(name): Path<String>, Query(params): Query<HashMap<String, String>>) -> ApiResult<Response> {
    let members = members_with_results(state.registry.clone(), &name).await?;
    if members.is_empty() {
        return Err(ApiError::NotFound);
    }

    let max_age = parse_query_i64(&params, "max_age");
    let now = crate::responses::now_unix();

    let mut summary = AggregateSummary::default();
    let mut clients = std::collections::HashSet::new();
    let mut checks = std::collections::HashSet::new();
    for (member, result) in &members {
        clients.insert(member.client.clone());
        checks.insert(member.check.clone());

        let stale = max_age.map(|age| executed_of(result) < now - age).unwrap_or(false);
        if stale {
            summary.results.stale += 1;
            continue;
        }
        summary.results.bump(Severity::from_status(status_of(result)));
    }
    summary.clients = clients.len();
    summary.checks = checks.len();

    Ok(Json(summary).into_response())
}

pub async fn delete(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    let names = state.registry.smembers("aggregates").await?;
    if !names.contains(&name) {
        return Err(ApiError::NotFound);
    }
    state.registry.srem("aggregates", &name).await?;
    state.registry.del(&aggregate_key(&name)).await?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

pub async fn clients(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    let raw_members = state.registry.smembers(&aggregate_key(&name)).await?;
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for raw in raw_members {
        if let Some(member) = AggregateMember::parse(&raw) {
            grouped.entry(member.client).or_default().push(member.check);
        }
    }
    if grouped.is_empty() {
        return Err(ApiError::NotFound);
    }

    let body: Vec<AggregateClientGroup> = grouped
        .into_iter()
        .map(|(name, checks)| AggregateClientGroup { name, checks })
        .collect();
    Ok(Json(body).into_response())
}

pub async fn checks(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Response> {
    let raw_members = state.registry.smembers(&aggregate_key(&name)).await?;
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for raw in raw_members {
        if let Some(member) = AggregateMember::parse(&raw) {
            grouped.entry(member.check).or_default().push(member.client);
        }
    }
    if grouped.is_empty() {
        return Err(ApiError::NotFound);
    }

    let body: Vec<AggregateCheckGroup> = grouped
        .into_iter()
        .map(|(check, clients)| AggregateCheckGroup { check, clients })
        .collect();
    Ok(Json(body).into_response())
}

pub async fn results_by_severity(
    State(state): State<AppState>,
    Path((name, severity)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let Some(severity) = Severity::parse(&severity) else {
        return Err(ApiError::BadRequest);
    };

    let members = members_with_results(state.registry.clone(), &name).await?;
    if members.is_empty() {
        return Err(ApiError::NotFound);
    }

    let max_age = parse_query_i64(&params, "max_age");
    let now = crate::responses::now_unix();

    // check -> output -> clients
    let mut grouped: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
    for (member, result) in &members {
        if Severity::from_status(status_of(result)) != severity {
            continue;
        }
        if let Some(age) = max_age {
            if executed_of(result) < now - age {
                continue;
            }
        }
        grouped
            .entry(member.check.clone())
            .or_default()
            .entry(crate::models::output_of(result))
            .or_default()
            .push(member.client.clone());
    }

    let body: Vec<SeverityCheckGroup> = grouped
        .into_iter()
        .map(|(check, by_output)| SeverityCheckGroup {
            check,
            summary: by_output
                .into_iter()
                .map(|(output, clients)| SeverityOutputGroup { total: clients.len(), output, clients })
                .collect(),
        })
        .collect();

    Ok(Json(body).into_response())
}
