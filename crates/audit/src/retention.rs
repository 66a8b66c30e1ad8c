//! Background pruning of expired log files.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::file::FileLogSink;
use crate::stream::RetentionPolicy;

/// How often expired files are looked for.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(6 * 3600);

/// Periodically deletes log files older than their stream's retention.
pub struct RetentionTask {
    sink: Arc<FileLogSink>,
    policy: RetentionPolicy,
    interval: Duration,
}

impl RetentionTask {
    pub fn new(sink: Arc<FileLogSink>, policy: RetentionPolicy) -> Self {
        Self {
            sink,
            policy,
            interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until `cancel` fires. The first pass runs immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Log retention task cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let today = Utc::now().date_naive();
                    match self.sink.prune_expired(&self.policy, today).await {
                        Ok(removed) if !removed.is_empty() => {
                            tracing::info!(count = removed.len(), "Pruned expired log files");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Failed to prune log files"),
                    }
                }
            }
        }
    }
}
