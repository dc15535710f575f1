//! Request body validation
//!
//! Implements `read_data(rules)`: parse the request body as a JSON object
//! and check each field against a small per-key rule. This is the only
//! input-shape gate most POST handlers need; anything more specific (the
//! client payload's business validity) goes through the [`crate::auth::Validator`]
//! instead.

use regex::Regex;
use serde_json::Value;

/// The JSON type a field's value is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Bool,
    Object,
    Array,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

/// A single field rule: `key -> {type, nil_ok?, regex?}`.
pub struct Rule {
    pub key: &'static str,
    pub field_type: FieldType,
    pub nil_ok: bool,
    pub regex: Option<Regex>,
}

impl Rule {
    pub fn new(key: &'static str, field_type: FieldType) -> Self {
        Self {
            key,
            field_type,
            nil_ok: false,
            regex: None,
        }
    }

    pub fn nil_ok(mut self) -> Self {
        self.nil_ok = true;
        self
    }

    pub fn regex(mut self, pattern: &str) -> Self {
        self.regex = Some(Regex::new(pattern).expect("valid validation regex"));
        self
    }

    /// Like [`Rule::regex`], but takes an already-compiled pattern — for
    /// callers that build the same rule set on every request and want to
    /// compile the regex once, e.g. behind a `LazyLock`.
    pub fn regex_compiled(mut self, re: &Regex) -> Self {
        self.regex = Some(re.clone());
        self
    }
}

/// A value passes a rule iff its type matches AND (the regex is absent, OR
/// the value matches the regex at position 0). `nil_ok` only ever grants an
/// exemption for an *absent or null* value — it never overrides a type or
/// regex mismatch on a value that is actually present. This is the reading
/// the distilled spec's design notes call out explicitly: the source's
/// boolean expression lets a non-null value pass whenever no regex is
/// configured, regardless of `nil_ok`.
fn field_passes(value: Option<&Value>, rule: &Rule) -> bool {
    match value {
        None => rule.nil_ok,
        Some(Value::Null) => rule.nil_ok,
        Some(v) => {
            if !rule.field_type.matches(v) {
                return false;
            }
            match &rule.regex {
                None => true,
                Some(re) => v
                    .as_str()
                    .map(|s| re.find(s).map(|m| m.start() == 0).unwrap_or(false))
                    .unwrap_or(false),
            }
        }
    }
}

/// Parses `body` as a JSON object and applies every rule. Returns the
/// parsed object on success, or `None` on a parse error or any rule
/// failure — callers map `None` to `bad_request`.
pub fn read_data(body: &[u8], rules: &[Rule]) -> Option<serde_json::Map<String, Value>> {
    let parsed: Value = serde_json::from_slice(body).ok()?;
    let obj = parsed.as_object()?.clone();

    for rule in rules {
        if !field_passes(obj.get(rule.key), rule) {
            return None;
        }
    }

    Some(obj)
}
