//! Fleet monitoring control-plane API
//!
//! A thin HTTP surface over a key/value registry and a message transport:
//! client registration, check definitions and on-demand requests, events,
//! results, aggregates, and stashes. Handlers never talk to Redis or AMQP
//! directly — they depend on the [`registry::Registry`] and
//! [`transport::Transport`] traits, so tests can swap in the in-memory fakes
//! colocated in each module.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod publish;
pub mod registry;
pub mod responses;
pub mod settings;
pub mod transport;
pub mod validation;

use std::sync::Arc;

use auth::Validator;
use registry::Registry;
use settings::Settings;
use transport::Transport;

/// Shared, cheaply-`Clone`able handles every handler depends on.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<dyn Registry>,
    pub transport: Arc<dyn Transport>,
    pub validator: Arc<dyn Validator>,
}
