//! Process entry point: loads configuration, connects the registry and
//! transport backends, assembles the router, and serves until interrupted.

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use sensu_api::auth::NameCharsetValidator;
use sensu_api::handlers::{aggregates, checks, clients, events, meta, results, stashes};
use sensu_api::registry::RedisRegistry;
use sensu_api::settings::Settings;
use sensu_api::transport::AmqpTransport;
use sensu_api::AppState;

fn router(state: AppState) -> Router {
    Router::new()
        .route("/info", get(meta::info))
        .route("/health", get(meta::health))
        .route("/clients", post(clients::create).get(clients::list))
        .route("/clients/:name", get(clients::get).delete(clients::delete))
        .route("/clients/:name/history", get(clients::history))
        .route("/checks", get(checks::list))
        .route("/checks/:name", get(checks::get))
        .route("/request", post(checks::request))
        .route("/events", get(events::list_all))
        .route("/events/:client", get(events::list_for_client))
        .route("/events/:client/:check", get(events::get).delete(events::delete))
        .route("/resolve", post(events::resolve))
        .route("/results", post(results::create).get(results::list_all))
        .route("/results/:client", get(results::list_for_client))
        .route("/results/:client/:check", get(results::get).delete(results::delete))
        .route("/aggregates", get(aggregates::list))
        .route("/aggregates/:name", get(aggregates::get).delete(aggregates::delete))
        .route("/aggregates/:name/clients", get(aggregates::clients))
        .route("/aggregates/:name/checks", get(aggregates::checks))
        .route("/aggregates/:name/results/:severity", get(aggregates::results_by_severity))
        .route("/stashes", get(stashes::list).post(stashes::create))
        // registered after every fixed-segment route: stash paths are free-form
        .route("/stash/*path", get(stashes::get).post(stashes::put).delete(stashes::delete))
        .layer(axum::middleware::from_fn_with_state(state.clone(), sensu_api::middleware::pipeline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env();
    info!(bind = %settings.bind_address(), "starting sensu-api");

    let registry = RedisRegistry::connect(&settings.redis_url).await?;
    let transport = AmqpTransport::connect(&settings.amqp_url).await?;

    let state = AppState {
        settings: Arc::new(settings.clone()),
        registry: Arc::new(registry),
        transport: Arc::new(transport),
        validator: Arc::new(NameCharsetValidator),
    };

    let registry = state.registry.clone();
    let transport = state.transport.clone();

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(settings.bind_address()).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("listener drained, closing backends");
    registry.close().await;
    transport.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
