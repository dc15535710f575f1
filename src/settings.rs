//! Configuration management
//!
//! Loads all process configuration from environment variables (with an
//! `.env` file as a development convenience) plus one JSON file for check
//! definitions. Settings are read once at startup and shared read-only
//! across every handler.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;

/// Get environment variable value or fall back to a default.
pub fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

/// Parse boolean environment variables ("1"/"true"/"TRUE" vs
/// "0"/"false"/"FALSE"); anything else falls back to `fallback`.
pub fn bool_env(key: &str, fallback: bool) -> bool {
    match env::var(key).as_deref() {
        Ok("1") | Ok("true") | Ok("TRUE") => true,
        Ok("0") | Ok("false") | Ok("FALSE") => false,
        _ => fallback,
    }
}

/// Parse comma-separated values, trimming whitespace and dropping empties.
pub fn parse_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Default CORS headers applied when settings don't override them.
pub fn default_cors() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("Origin".to_string(), "*".to_string());
    m.insert(
        "Methods".to_string(),
        "GET, POST, PUT, DELETE, OPTIONS".to_string(),
    );
    m.insert("Credentials".to_string(), "true".to_string());
    m.insert(
        "Headers".to_string(),
        "Origin, X-Requested-With, Content-Type, Accept, Authorization".to_string(),
    );
    m
}

/// Parses a `SENSU_API_CORS` override string of the form
/// `Header1=value1,Header2=value2` into a header-name/value map, merged
/// over the defaults (an override replaces only the headers it names).
fn parse_cors(raw: Option<&str>) -> HashMap<String, String> {
    let mut m = default_cors();
    for pair in parse_csv(raw) {
        if let Some((k, v)) = pair.split_once('=') {
            m.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    m
}

/// A single named check definition, as configured out-of-band (by whatever
/// process populates the `checks` section of settings). Arbitrary
/// additional fields are preserved under `extra` since the API only ever
/// echoes this map back verbatim or clones it into a request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDefinition {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub subscribers: Option<Vec<String>>,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Basic-auth credential pair. Authentication is only enforced when both
/// are configured (I4.1).
#[derive(Debug, Clone)]
pub struct ApiAuth {
    pub user: String,
    pub password: String,
}

/// Read-only snapshot of process configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub auth: Option<ApiAuth>,
    pub cors: HashMap<String, String>,
    pub checks: HashMap<String, CheckDefinition>,
    pub redis_url: String,
    pub amqp_url: String,
}

impl Settings {
    /// Load settings from the environment.
    ///
    /// - `SENSU_API_BIND` (default `0.0.0.0`)
    /// - `SENSU_API_PORT` (default `4567`)
    /// - `SENSU_API_USER` / `SENSU_API_PASSWORD` (both required to enable auth)
    /// - `SENSU_API_CORS` (CSV of `Header=value` overrides)
    /// - `SENSU_API_CHECKS_CONFIG` (path to a JSON object of check definitions)
    /// - `SENSU_API_REDIS_URL` (default `redis://127.0.0.1:6379`)
    /// - `SENSU_API_AMQP_URL` (default `amqp://127.0.0.1:5672/%2f`)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let user = env::var("SENSU_API_USER").ok();
        let password = env::var("SENSU_API_PASSWORD").ok();
        let auth = match (user, password) {
            (Some(user), Some(password)) => Some(ApiAuth { user, password }),
            _ => None,
        };

        let checks = env::var("SENSU_API_CHECKS_CONFIG")
            .ok()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        Self {
            bind: env_or("SENSU_API_BIND", "0.0.0.0"),
            port: env_or("SENSU_API_PORT", "4567")
                .parse()
                .unwrap_or(4567),
            auth,
            cors: parse_cors(env::var("SENSU_API_CORS").ok().as_deref()),
            checks,
            redis_url: env_or("SENSU_API_REDIS_URL", "redis://127.0.0.1:6379"),
            amqp_url: env_or("SENSU_API_AMQP_URL", "amqp://127.0.0.1:5672/%2f"),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_csv_trims_and_drops_empty() {
        assert_eq!(
            parse_csv(Some("a, b ,, c ")),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(parse_csv(None), Vec::<String>::new());
    }

    #[test]
    fn default_cors_matches_spec() {
        let cors = default_cors();
        assert_eq!(cors.get("Origin").unwrap(), "*");
        assert_eq!(cors.get("Methods").unwrap(), "GET, POST, PUT, DELETE, OPTIONS");
        assert_eq!(cors.get("Credentials").unwrap(), "true");
        assert_eq!(
            cors.get("Headers").unwrap(),
            "Origin, X-Requested-With, Content-Type, Accept, Authorization"
        );
    }

    #[test]
    fn cors_override_replaces_named_header_only() {
        let cors = parse_cors(Some("Origin=https://example.com"));
        assert_eq!(cors.get("Origin").unwrap(), "https://example.com");
        // untouched headers keep their default
        assert_eq!(cors.get("Credentials").unwrap(), "true");
    }

    #[test]
    fn bool_env_parses_common_forms() {
        assert!(bool_env("__NOPE__", true));
        assert!(!bool_env("__NOPE__", false));
    }
}
