//! Audit trail: durable log streams, the recorder that writes to them, and
//! the report engine that reads them back.

pub mod error;
pub mod file;
pub mod recorder;
pub mod report;
pub mod retention;
pub mod sink;
pub mod stream;

pub use error::AuditError;
pub use file::{DailyFileWriter, FileLogSink};
pub use recorder::{AuditContext, AuditRecorder, Outcome};
pub use report::{AuditReportEngine, ReportFilters, SuspiciousPattern, UsageStatistics};
pub use retention::RetentionTask;
pub use sink::{LogSink, MemoryLogSink};
pub use stream::{LogStream, RetentionPolicy};
