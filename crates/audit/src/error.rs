/// Failures of the log sink and the report engine.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Log sink unavailable: {0}")]
    Unavailable(String),
}
