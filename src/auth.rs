//! Authentication and client validation
//!
//! Two unrelated concerns share this module because both gate requests
//! before a handler runs: HTTP Basic authentication against the single
//! shared API credential, and the pluggable client-payload validator that
//! `POST /clients` consults before writing anything to the registry.

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::settings::ApiAuth;

/// Checks the `Authorization` header against the configured credential
/// pair. Returns `true` when auth is satisfied — including when no
/// credential pair is configured at all, since authentication is only
/// enforced when both `api.user` and `api.password` are set.
pub fn check_basic_auth(headers: &HeaderMap, auth: &Option<ApiAuth>) -> bool {
    let Some(auth) = auth else {
        return true;
    };

    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return false;
    };
    let Ok(header) = header.to_str() else {
        return false;
    };
    let Some(encoded) = header.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((user, password)) = decoded.split_once(':') else {
        return false;
    };

    user == auth.user && password == auth.password
}

/// Capability over a client registration payload. A real deployment wires
/// in whatever policy the fleet needs (name collisions, required fields,
/// schema checks); this process only needs the call shape.
pub trait Validator: Send + Sync {
    fn valid(&self, client: &serde_json::Value) -> bool;
}

/// Accepts every payload. Suitable default when no external validator is
/// configured; production deployments should supply their own.
pub struct AllowAll;

impl Validator for AllowAll {
    fn valid(&self, _client: &serde_json::Value) -> bool {
        true
    }
}

/// Matches the client name charset fixed by the data model:
/// `[A-Za-z0-9_.\-]+`. Rejects payloads with a missing or malformed `name`.
pub struct NameCharsetValidator;

impl Validator for NameCharsetValidator {
    fn valid(&self, client: &serde_json::Value) -> bool {
        match client.get("name").and_then(serde_json::Value::as_str) {
            Some(name) if !name.is_empty() => {
                name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
            }
            _ => false,
        }
    }
}
