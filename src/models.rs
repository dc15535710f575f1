//! Shared data shapes
//!
//! Definitions for the entities the registry stores and the API serializes:
//! clients, events, results, aggregates, and stashes. Registry values are
//! untyped JSON in practice (the registry has no schema of its own); these
//! types exist for the shapes the API itself constructs or groups rather
//! than a schema the registry enforces.

use serde::Serialize;
use serde_json::{Map, Value};

/// API-visible version string embedded in created clients and `/info`.
pub const VERSION: &str = "1.0.0";

/// Severity bucket derived from a result's integer `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    /// Maps a raw result status to its severity bucket. Closed set: any
    /// value outside `{0,1,2}` falls into `Unknown`.
    pub fn from_status(status: i64) -> Self {
        match status {
            0 => Severity::Ok,
            1 => Severity::Warning,
            2 => Severity::Critical,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Severity::Ok),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            "unknown" => Some(Severity::Unknown),
            _ => None,
        }
    }
}

/// One entry of `GET /clients/<name>/history`.
#[derive(Debug, Clone, Serialize)]
pub struct ClientHistoryEntry {
    pub check: String,
    pub history: Vec<i64>,
    pub last_execution: i64,
    pub last_status: i64,
    pub last_result: Value,
}

/// `GET /results` / `/results/<client>` entry.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEntry {
    pub client: String,
    pub check: Value,
}

/// One row of `GET /aggregates/<name>`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AggregateSummary {
    pub clients: usize,
    pub checks: usize,
    pub results: AggregateCounts,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AggregateCounts {
    pub ok: u64,
    pub warning: u64,
    pub critical: u64,
    pub unknown: u64,
    pub total: u64,
    pub stale: u64,
}

impl AggregateCounts {
    pub fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Ok => self.ok += 1,
            Severity::Warning => self.warning += 1,
            Severity::Critical => self.critical += 1,
            Severity::Unknown => self.unknown += 1,
        }
        self.total += 1;
    }
}

/// A single `<client>:<check>` aggregate member, as stored in
/// `aggregates:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateMember {
    pub client: String,
    pub check: String,
}

impl AggregateMember {
    /// Splits on the *first* colon, matching subscription-style encoding.
    pub fn parse(raw: &str) -> Option<Self> {
        let (client, check) = raw.split_once(':')?;
        if client.is_empty() || check.is_empty() {
            return None;
        }
        Some(Self {
            client: client.to_string(),
            check: check.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!("{}:{}", self.client, self.check)
    }
}

/// Grouped row of `GET /aggregates/<name>/clients`.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateClientGroup {
    pub name: String,
    pub checks: Vec<String>,
}

/// Grouped row of `GET /aggregates/<name>/checks`.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateCheckGroup {
    pub check: String,
    pub clients: Vec<String>,
}

/// Grouped row of `GET /aggregates/<name>/results/<severity>`.
#[derive(Debug, Clone, Serialize)]
pub struct SeverityCheckGroup {
    pub check: String,
    pub summary: Vec<SeverityOutputGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeverityOutputGroup {
    pub output: String,
    pub total: usize,
    pub clients: Vec<String>,
}

/// `GET /stashes` entry.
#[derive(Debug, Clone, Serialize)]
pub struct StashEntry {
    pub path: String,
    pub content: Value,
    pub expire: i64,
}

/// Extracts the result's `status` field, defaulting to 0 when absent or
/// non-integer, matching the `check.status ?? 0` rule used when publishing.
pub fn status_of(result: &Value) -> i64 {
    result.get("status").and_then(Value::as_i64).unwrap_or(0)
}

/// Extracts the result's `executed` unix-seconds field, or 0 when absent.
pub fn executed_of(result: &Value) -> i64 {
    result.get("executed").and_then(Value::as_i64).unwrap_or(0)
}

/// Extracts the result's `output` field as a string, or empty when absent.
pub fn output_of(result: &Value) -> String {
    result
        .get("output")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Shallow-merges `patch` into `base`, overwriting matching keys. Used to
/// build the event-resolution pseudo-result from a stored event's `check`.
pub fn merge_object(base: &Value, patch: &Map<String, Value>) -> Value {
    let mut out = base.as_object().cloned().unwrap_or_default();
    for (k, v) in patch {
        out.insert(k.clone(), v.clone());
    }
    Value::Object(out)
}
