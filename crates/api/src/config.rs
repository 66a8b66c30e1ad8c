use std::path::PathBuf;

use biblioteca_audit::RetentionPolicy;
use biblioteca_core::classify::{DEFAULT_CRITICAL_OPERATION_MS, DEFAULT_SLOW_OPERATION_MS};

use crate::auth::jwt::JwtConfig;
use crate::services::lifecycle::StatusFallback;

/// Tracing directives used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str =
    "biblioteca_api=debug,biblioteca_audit=info,biblioteca_db=info,tower_http=debug";

/// Where entities are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// In-process store; data is lost on restart.
    Memory,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Where audit streams are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBackend {
    File,
    Memory,
}

impl LogBackend {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown log sink '{other}'")),
        }
    }
}

/// Log sink configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory of the daily stream files (default: `logs`).
    pub dir: PathBuf,
    pub backend: LogBackend,
    pub retention: RetentionPolicy,
    /// Seconds between retention passes (default: 6 hours).
    pub prune_interval_secs: u64,
}

impl LogConfig {
    /// Load log configuration from environment variables.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `LOG_DIR`                 | `logs`  |
    /// | `LOG_SINK`                | `file`  |
    /// | `LOG_RETENTION_GENERAL_DAYS` | `30` |
    /// | `LOG_RETENTION_AUDIT_DAYS`   | `90` |
    /// | `LOG_RETENTION_ERROR_DAYS`   | `30` |
    /// | `LOG_RETENTION_SECURITY_DAYS`| `365` |
    /// | `LOG_PRUNE_INTERVAL_SECS` | `21600` |
    pub fn from_env() -> Self {
        let defaults = RetentionPolicy::default();
        let retention = RetentionPolicy {
            general_days: env_or("LOG_RETENTION_GENERAL_DAYS", defaults.general_days),
            audit_days: env_or("LOG_RETENTION_AUDIT_DAYS", defaults.audit_days),
            error_days: env_or("LOG_RETENTION_ERROR_DAYS", defaults.error_days),
            security_days: env_or("LOG_RETENTION_SECURITY_DAYS", defaults.security_days),
        };

        let sink = std::env::var("LOG_SINK").unwrap_or_else(|_| "file".into());
        let backend = LogBackend::parse(&sink).unwrap_or_else(|e| panic!("LOG_SINK: {e}"));

        Self {
            dir: std::env::var("LOG_DIR")
                .unwrap_or_else(|_| "logs".into())
                .into(),
            backend,
            retention,
            prune_interval_secs: env_or("LOG_PRUNE_INTERVAL_SECS", 6 * 3600),
        }
    }
}

/// Credentials of an admin account created at startup if missing.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after shutdown (default: `10`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub log: LogConfig,
    pub storage: StorageBackend,
    /// Ids used when a status lookup by name misses; `None` disables the
    /// fallback.
    pub status_fallback: Option<StatusFallback>,
    /// Requests slower than this get a performance audit entry.
    pub slow_operation_ms: u64,
    /// Requests slower than this get a `warn` performance entry.
    pub critical_operation_ms: u64,
    /// Root directory for uploaded files (default: `uploads`).
    pub upload_dir: PathBuf,
    pub admin: Option<AdminSeed>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `10`                    |
    /// | `STORAGE_BACKEND`       | `postgres`              |
    /// | `STATUS_FALLBACK_IDS`   | `1,2`                   |
    /// | `SLOW_OPERATION_MS`     | `3000`                  |
    /// | `CRITICAL_OPERATION_MS` | `5000`                  |
    /// | `UPLOAD_DIR`            | `uploads`               |
    /// | `ADMIN_EMAIL`, `ADMIN_PASSWORD`, `ADMIN_NAME` | unset |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let storage = StorageBackend::parse(
            &std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "postgres".into()),
        )
        .unwrap_or_else(|e| panic!("STORAGE_BACKEND: {e}"));

        let status_fallback = parse_status_fallback(
            &std::env::var("STATUS_FALLBACK_IDS").unwrap_or_else(|_| "1,2".into()),
        )
        .unwrap_or_else(|e| panic!("STATUS_FALLBACK_IDS: {e}"));

        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminSeed {
                    email,
                    password,
                    name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrador".into()),
                })
            }
            _ => None,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 10),
            jwt: JwtConfig::from_env(),
            log: LogConfig::from_env(),
            storage,
            status_fallback,
            slow_operation_ms: env_or("SLOW_OPERATION_MS", DEFAULT_SLOW_OPERATION_MS),
            critical_operation_ms: env_or("CRITICAL_OPERATION_MS", DEFAULT_CRITICAL_OPERATION_MS),
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".into())
                .into(),
            admin,
        }
    }
}

/// Parse `STATUS_FALLBACK_IDS`: `"<active>,<deleted>"`, or `none` to
/// disable the fallback.
pub fn parse_status_fallback(value: &str) -> Result<Option<StatusFallback>, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let (active, deleted) = value
        .split_once(',')
        .ok_or_else(|| format!("expected '<active>,<deleted>' or 'none', got '{value}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid status id '{}': {e}", s.trim()))
    };
    let fallback = StatusFallback {
        active_id: parse(active)?,
        deleted_id: parse(deleted)?,
    };
    if fallback.active_id == fallback.deleted_id {
        return Err("active and deleted fallback ids must differ".into());
    }
    Ok(Some(fallback))
}

/// Read and parse an env var, falling back to `default` when unset.
///
/// # Panics
///
/// Panics if the variable is set but does not parse.
fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid value: {e}")),
        Err(_) => default,
    }
}
