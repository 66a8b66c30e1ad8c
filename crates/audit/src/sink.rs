//! The log sink abstraction and an in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use biblioteca_core::audit::AuditLogEntry;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::AuditError;
use crate::stream::LogStream;

/// Durable, append-only storage for audit records.
///
/// One instance is built at startup and shared (`Arc<dyn LogSink>`) by the
/// recorder and the report engine.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append one already-serialized record to a stream.
    async fn write_line(&self, stream: LogStream, line: &str) -> Result<(), AuditError>;

    /// Lazily read every retained line of a stream, oldest file first.
    fn scan(&self, stream: LogStream) -> BoxStream<'static, Result<String, AuditError>>;

    /// Serialize `entry` once and append it to every stream it routes to.
    async fn append(&self, entry: &AuditLogEntry) -> Result<(), AuditError> {
        let line = serde_json::to_string(entry)?;
        for stream in LogStream::routes(entry) {
            self.write_line(stream, &line).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryLogSink
// ---------------------------------------------------------------------------

/// Keeps every stream in memory. Used by tests and `LOG_SINK=memory` runs.
#[derive(Default)]
pub struct MemoryLogSink {
    streams: Mutex<BTreeMap<LogStream, Vec<String>>>,
    unavailable: bool,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write and scan fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Raw lines of one stream.
    pub fn lines(&self, stream: LogStream) -> Vec<String> {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Parsed entries of one stream; unparseable lines are skipped.
    pub fn entries(&self, stream: LogStream) -> Vec<AuditLogEntry> {
        self.lines(stream)
            .iter()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }

    /// Insert a raw line, bypassing serialization.
    pub fn push_raw(&self, stream: LogStream, line: impl Into<String>) {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(stream)
            .or_default()
            .push(line.into());
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn write_line(&self, stream: LogStream, line: &str) -> Result<(), AuditError> {
        if self.unavailable {
            return Err(AuditError::Unavailable(format!("{stream} stream is unavailable")));
        }
        self.push_raw(stream, line);
        Ok(())
    }

    fn scan(&self, log: LogStream) -> BoxStream<'static, Result<String, AuditError>> {
        if self.unavailable {
            let err = AuditError::Unavailable(format!("{log} stream is unavailable"));
            return stream::once(async move { Err(err) }).boxed();
        }
        stream::iter(self.lines(log).into_iter().map(Ok)).boxed()
    }
}
