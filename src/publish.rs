//! Transport publication
//!
//! Builds the three payload shapes the API ever puts on the bus — check
//! requests, check results, and event-resolution pseudo-results — and
//! dispatches them through the [`Transport`] facade. Publish failures are
//! logged and swallowed: the HTTP response that triggered the publish has
//! already been sent by the time these run.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::transport::{Exchange, Transport};

/// Publishes a check request to every subscriber, splitting `direct`/
/// `roundrobin` subscriptions to the `direct` exchange and everything else
/// to `fanout`, each keyed by the full subscription string.
pub async fn publish_check_request(transport: &dyn Transport, mut check: Value, now: i64) {
    if let Some(obj) = check.as_object_mut() {
        obj.insert("issued".to_string(), Value::from(now));
    }

    let subscribers: Vec<String> = check
        .get("subscribers")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    for subscription in subscribers {
        let exchange = match subscription.split_once(':') {
            Some((kind, _)) if kind == "direct" || kind == "roundrobin" => Exchange::Direct,
            _ => Exchange::Fanout,
        };

        if let Err(err) = transport.publish(exchange, &subscription, &check).await {
            tracing::error!(
                subscription = %subscription,
                error = %err,
                "failed to publish check request"
            );
        }
    }
}

/// Publishes a check result for `client_name` to the `direct` exchange,
/// `results` queue, stamping `issued`/`executed` and defaulting `status` to
/// 0 when absent.
pub async fn publish_check_result(transport: &dyn Transport, client_name: &str, mut check: Value, now: i64) {
    if let Some(obj) = check.as_object_mut() {
        obj.insert("issued".to_string(), Value::from(now));
        obj.insert("executed".to_string(), Value::from(now));
        if !obj.contains_key("status") || obj.get("status").map(Value::is_null).unwrap_or(true) {
            obj.insert("status".to_string(), Value::from(0));
        }
    }

    let payload = serde_json::json!({
        "client": client_name,
        "check": check,
    });

    if let Err(err) = transport.publish(Exchange::Direct, "results", &payload).await {
        tracing::error!(client = %client_name, error = %err, "failed to publish check result");
    }
}

/// Builds and publishes the resolving pseudo-result for a stored event,
/// merging the event's `check` object with the fixed resolution fields and
/// dropping any `history` the stored check carried.
pub async fn resolve_event(transport: &dyn Transport, event: &Value, now: i64) {
    let Some(client_name) = event
        .get("client")
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        tracing::error!("event missing client.name, cannot resolve");
        return;
    };

    let check = event.get("check").cloned().unwrap_or(Value::Object(Map::new()));

    let mut patch = Map::new();
    patch.insert(
        "output".to_string(),
        Value::String("Resolving on request of the API".to_string()),
    );
    patch.insert("status".to_string(), Value::from(0));
    patch.insert("force_resolve".to_string(), Value::Bool(true));

    let mut resolved = crate::models::merge_object(&check, &patch);
    if let Some(obj) = resolved.as_object_mut() {
        obj.remove("history");
    }

    publish_check_result(transport, &client_name, resolved, now).await;
}

/// Spawns [`publish_check_request`] without waiting for completion — used
/// by handlers that have already written their response.
pub fn spawn_check_request(transport: Arc<dyn Transport>, check: Value, now: i64) {
    tokio::spawn(async move {
        publish_check_request(transport.as_ref(), check, now).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeTransport;

    #[tokio::test]
    async fn check_request_splits_direct_and_fanout() {
        let transport = FakeTransport::new();
        let check = serde_json::json!({
            "name": "cpu",
            "subscribers": ["direct:hostA", "roles:web", "roundrobin:db"],
        });
        publish_check_request(&transport, check, 1000).await;

        let published = transport.published();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].exchange, Exchange::Direct);
        assert_eq!(published[0].routing_key, "direct:hostA");
        assert_eq!(published[1].exchange, Exchange::Fanout);
        assert_eq!(published[1].routing_key, "roles:web");
        assert_eq!(published[2].exchange, Exchange::Direct);
        assert_eq!(published[2].routing_key, "roundrobin:db");
        assert_eq!(published[0].payload["issued"], 1000);
    }

    #[tokio::test]
    async fn check_result_defaults_status_and_stamps_times() {
        let transport = FakeTransport::new();
        publish_check_result(&transport, "web-01", serde_json::json!({"output": "ok"}), 500).await;

        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].exchange, Exchange::Direct);
        assert_eq!(published[0].routing_key, "results");
        assert_eq!(published[0].payload["client"], "web-01");
        assert_eq!(published[0].payload["check"]["status"], 0);
        assert_eq!(published[0].payload["check"]["issued"], 500);
        assert_eq!(published[0].payload["check"]["executed"], 500);
    }

    #[tokio::test]
    async fn check_result_preserves_explicit_status() {
        let transport = FakeTransport::new();
        publish_check_result(&transport, "web-01", serde_json::json!({"status": 2}), 500).await;
        assert_eq!(transport.published()[0].payload["check"]["status"], 2);
    }

    #[tokio::test]
    async fn resolve_event_builds_pseudo_result() {
        let transport = FakeTransport::new();
        let event = serde_json::json!({
            "client": {"name": "db-7"},
            "check": {"name": "disk", "status": 2, "output": "full", "history": [2, 2, 1]},
        });
        resolve_event(&transport, &event, 777).await;

        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload["client"], "db-7");
        let check = &published[0].payload["check"];
        assert_eq!(check["output"], "Resolving on request of the API");
        assert_eq!(check["status"], 0);
        assert_eq!(check["force_resolve"], true);
        assert_eq!(check["name"], "disk");
        assert!(check.get("history").is_none());
    }
}
