//! Audit trail record types, redaction, and change diffing.
//!
//! This module lives in `core` (zero internal deps) so the recorder, the
//! report engine, and the HTTP layer all agree on one record shape.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Categories and levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    Auth,
    UserManagement,
    BookManagement,
    GenreManagement,
    DataAccess,
    System,
    Security,
}

impl AuditCategory {
    pub const ALL: [AuditCategory; 7] = [
        Self::Auth,
        Self::UserManagement,
        Self::BookManagement,
        Self::GenreManagement,
        Self::DataAccess,
        Self::System,
        Self::Security,
    ];

    /// Wire name, e.g. `"BOOK_MANAGEMENT"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "AUTH",
            Self::UserManagement => "USER_MANAGEMENT",
            Self::BookManagement => "BOOK_MANAGEMENT",
            Self::GenreManagement => "GENRE_MANAGEMENT",
            Self::DataAccess => "DATA_ACCESS",
            Self::System => "SYSTEM",
            Self::Security => "SECURITY",
        }
    }
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown audit category: {s}"))
    }
}

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

impl AuditLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Level for a business operation: failures are promoted to `warn`.
    pub fn for_outcome(success: bool) -> Self {
        if success {
            Self::Info
        } else {
            Self::Warn
        }
    }
}

// ---------------------------------------------------------------------------
// Actor / network metadata
// ---------------------------------------------------------------------------

/// Who performed an audited action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<DbId>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: DbId, email: Option<String>, role: Option<String>) -> Self {
        Self {
            user_id: Some(user_id),
            email,
            role,
        }
    }
}

/// Client network metadata captured from the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Audit log entry
// ---------------------------------------------------------------------------

/// One immutable audit record. Serialized as a single camelCase JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub timestamp: Timestamp,
    pub level: AuditLevel,
    pub category: AuditCategory,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<DbId>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Operation duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl AuditLogEntry {
    /// Start a new entry stamped with the current time.
    ///
    /// The level defaults from the outcome; use [`with_level`](Self::with_level)
    /// to override it.
    pub fn new(category: AuditCategory, action: impl Into<String>, success: bool) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level: AuditLevel::for_outcome(success),
            category,
            action: action.into(),
            user_id: None,
            user_email: None,
            user_role: None,
            resource_type: None,
            resource_id: None,
            success,
            error_message: None,
            details: None,
            ip_address: None,
            user_agent: None,
            duration: None,
        }
    }

    pub fn with_level(mut self, level: AuditLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_actor(mut self, actor: &Actor) -> Self {
        self.user_id = actor.user_id;
        self.user_email = actor.email.clone();
        self.user_role = actor.role.clone();
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: Option<DbId>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = resource_id;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Attach a details payload with sensitive keys redacted.
    pub fn with_details(mut self, details: AuditDetails) -> Self {
        let value = details.into_value();
        self.details = match value {
            Value::Null => None,
            other => Some(redact_sensitive_fields(&other)),
        };
        self
    }

    pub fn with_request_meta(mut self, meta: &RequestMeta) -> Self {
        self.ip_address = meta.ip_address.clone();
        self.user_agent = meta.user_agent.clone();
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }
}

// ---------------------------------------------------------------------------
// Typed details payloads
// ---------------------------------------------------------------------------

/// Request-level details recorded by the HTTP instrumentation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub method: String,
    pub url: String,
    pub operation: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Before/after diff of a mutated entity.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeDetails {
    /// `None` when nothing changed.
    pub changes: Option<Map<String, Value>>,
}

/// Slow-operation report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceDetails {
    pub operation: String,
    pub duration_ms: u64,
    pub threshold_ms: u64,
}

/// Error context for system-error entries.
#[derive(Debug, Clone, Serialize)]
pub struct SystemErrorDetails {
    pub context: String,
    pub error: String,
}

/// Details payload for an audit entry: one shape per event kind, with a
/// free-form map fallback.
#[derive(Debug, Clone)]
pub enum AuditDetails {
    None,
    Request(RequestDetails),
    Change(ChangeDetails),
    Performance(PerformanceDetails),
    SystemError(SystemErrorDetails),
    Fields(Map<String, Value>),
}

impl AuditDetails {
    /// Free-form details from a JSON value. Non-object values are wrapped
    /// under a `"value"` key.
    pub fn fields(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Object(map) => Self::Fields(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self::Fields(map)
            }
        }
    }

    pub fn into_value(self) -> Value {
        let result = match self {
            Self::None => return Value::Null,
            Self::Request(d) => serde_json::to_value(d),
            Self::Change(d) => serde_json::to_value(d),
            Self::Performance(d) => serde_json::to_value(d),
            Self::SystemError(d) => serde_json::to_value(d),
            Self::Fields(map) => return Value::Object(map),
        };
        // The typed payloads contain only strings, numbers, and maps, which
        // always serialize.
        result.unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Key fragments whose values are never written to the audit trail.
pub const SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret", "key"];

/// Replacement value for redacted fields.
pub const REDACTED: &str = "[REDACTED]";

/// Whether a key names a sensitive field (case-insensitive substring match).
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_FIELDS.iter().any(|f| lower.contains(f))
}

/// Redact sensitive fields from a JSON value, recursing through nested
/// objects and arrays.
pub fn redact_sensitive_fields(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) {
                    redacted.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact_sensitive_fields).collect()),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Change diffing
// ---------------------------------------------------------------------------

/// Compute `{field: {from, to}}` for every key of `new` whose value differs
/// from `old`. Returns `None` when nothing changed.
///
/// Keys only present in `old` are ignored; a key missing from `old` diffs
/// against `null`. Non-object inputs are compared as a whole under `"value"`.
pub fn compute_changes(old: &Value, new: &Value) -> Option<Map<String, Value>> {
    let mut changes = Map::new();
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, to) in new_map {
                let from = old_map.get(key).unwrap_or(&Value::Null);
                if from != to {
                    changes.insert(key.clone(), change_pair(from, to));
                }
            }
        }
        _ => {
            if old != new {
                changes.insert("value".to_string(), change_pair(old, new));
            }
        }
    }
    if changes.is_empty() {
        None
    } else {
        Some(changes)
    }
}

fn change_pair(from: &Value, to: &Value) -> Value {
    let mut pair = Map::new();
    pair.insert("from".to_string(), from.clone());
    pair.insert("to".to_string(), to.clone());
    Value::Object(pair)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
