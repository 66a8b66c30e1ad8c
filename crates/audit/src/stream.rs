//! Log stream names, routing, and retention.

use biblioteca_core::audit::{AuditCategory, AuditLevel, AuditLogEntry};
use chrono::NaiveDate;

/// A durable, per-day log stream. Files are named `<stream>-YYYY-MM-DD.log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogStream {
    /// Application logs from the `tracing` subscriber.
    General,
    /// Every audit entry.
    Audit,
    /// Error-level audit entries.
    Error,
    /// SECURITY-category audit entries.
    Security,
}

impl LogStream {
    pub const ALL: [LogStream; 4] = [Self::General, Self::Audit, Self::Error, Self::Security];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Audit => "audit",
            Self::Error => "error",
            Self::Security => "security",
        }
    }

    /// Streams an audit entry is appended to. Always includes `audit`.
    pub fn routes(entry: &AuditLogEntry) -> Vec<LogStream> {
        let mut streams = vec![Self::Audit];
        if entry.category == AuditCategory::Security {
            streams.push(Self::Security);
        }
        if entry.level == AuditLevel::Error {
            streams.push(Self::Error);
        }
        streams
    }

    pub fn file_name(self, date: NaiveDate) -> String {
        format!("{}-{}.log", self.as_str(), date.format("%Y-%m-%d"))
    }

    /// Parse `<stream>-YYYY-MM-DD.log` back into its parts.
    pub fn parse_file_name(name: &str) -> Option<(LogStream, NaiveDate)> {
        let stem = name.strip_suffix(".log")?;
        let (prefix, date) = stem.split_once('-')?;
        let stream = Self::ALL.into_iter().find(|s| s.as_str() == prefix)?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        Some((stream, date))
    }
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many days of files each stream keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub general_days: u32,
    pub audit_days: u32,
    pub error_days: u32,
    pub security_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            general_days: 30,
            audit_days: 90,
            error_days: 30,
            security_days: 365,
        }
    }
}

impl RetentionPolicy {
    pub fn days_for(&self, stream: LogStream) -> u32 {
        match stream {
            LogStream::General => self.general_days,
            LogStream::Audit => self.audit_days,
            LogStream::Error => self.error_days,
            LogStream::Security => self.security_days,
        }
    }

    /// Whether a file dated `file_date` has outlived its stream's retention
    /// as of `today`.
    pub fn is_expired(&self, stream: LogStream, file_date: NaiveDate, today: NaiveDate) -> bool {
        (today - file_date).num_days() > i64::from(self.days_for(stream))
    }
}
