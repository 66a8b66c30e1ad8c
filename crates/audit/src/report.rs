//! Reports over the persisted audit stream.
//!
//! Every report re-reads the `audit` stream lazily and folds matching entries
//! as they arrive; only the report output is materialized. Lines that do not
//! parse as an [`AuditLogEntry`] are skipped. Read failures are recorded
//! through [`AuditRecorder::log_system_error`] and returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use biblioteca_core::audit::{AuditCategory, AuditDetails, AuditLogEntry};
use biblioteca_core::types::{DbId, Timestamp};
use chrono::{DateTime, Duration, Local, Timelike, Utc};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::error::AuditError;
use crate::recorder::{AuditContext, AuditRecorder, Outcome};
use crate::sink::LogSink;
use crate::stream::LogStream;

pub const DEFAULT_ACTIVITY_DAYS: i64 = 30;
pub const DEFAULT_SECURITY_HOURS: i64 = 24;
pub const DEFAULT_STATISTICS_DAYS: i64 = 7;

/// Number of users listed in [`UsageStatistics::top_users`].
pub const TOP_USERS: usize = 10;

/// Failed logins from one IP within the window that raise an alert.
pub const LOGIN_FAILURE_THRESHOLD: u64 = 5;
/// Off-hours entries are flagged when their count exceeds this.
pub const OFF_HOURS_THRESHOLD: u64 = 10;
/// Local hours (inclusive) considered off-hours.
pub const OFF_HOURS: std::ops::RangeInclusive<u32> = 2..=6;
/// Users need at least this many operations to be rated.
pub const HIGH_FAILURE_MIN_OPERATIONS: u64 = 10;
/// Failure ratio (inclusive) that flags a user.
pub const HIGH_FAILURE_RATIO: f64 = 0.5;

/// Action of the SECURITY entry written for each detection.
pub const ACTION_SUSPICIOUS_ACTIVITY: &str = "SUSPICIOUS_ACTIVITY_DETECTED";

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Predicates for [`AuditReportEngine::generate_audit_report`]. Unset fields
/// match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilters {
    /// Inclusive lower bound.
    pub start_date: Option<Timestamp>,
    /// Inclusive upper bound.
    pub end_date: Option<Timestamp>,
    pub user_id: Option<DbId>,
    pub category: Option<AuditCategory>,
    /// Case-sensitive substring of the action.
    pub action: Option<String>,
    pub success: Option<bool>,
    pub ip_address: Option<String>,
}

impl ReportFilters {
    /// Entries in `[now - window, now]`. The start saturates at the
    /// earliest representable instant.
    pub fn window(now: Timestamp, window: Duration) -> Self {
        Self {
            start_date: Some(window_start(now, window)),
            end_date: Some(now),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.start_date
            .map_or(true, |start| entry.timestamp >= start)
            && self.end_date.map_or(true, |end| entry.timestamp <= end)
            && self.user_id.map_or(true, |id| entry.user_id == Some(id))
            && self.category.map_or(true, |c| entry.category == c)
            && self
                .action
                .as_deref()
                .map_or(true, |a| entry.action.contains(a))
            && self.success.map_or(true, |s| entry.success == s)
            && self
                .ip_address
                .as_deref()
                .map_or(true, |ip| entry.ip_address.as_deref() == Some(ip))
    }
}

fn window_start(now: Timestamp, window: Duration) -> Timestamp {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn days_window(days: i64) -> Duration {
    Duration::try_days(days).unwrap_or(Duration::MAX)
}

fn hours_window(hours: i64) -> Duration {
    Duration::try_hours(hours).unwrap_or(Duration::MAX)
}

// ---------------------------------------------------------------------------
// Usage statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationCount {
    pub user_id: DbId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStatistics {
    pub period: ReportPeriod,
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub unique_users: usize,
    pub operations_by_category: BTreeMap<String, u64>,
    pub operations_by_user: BTreeMap<DbId, u64>,
    /// Keyed by zero-padded local hour, `"00"`..`"23"`. Hours without
    /// activity are absent.
    pub operations_by_hour: BTreeMap<String, u64>,
    pub top_users: Vec<UserOperationCount>,
    /// Percentage with two decimals, `"0.00"` for an empty window.
    pub failure_rate: String,
}

/// Running totals for [`UsageStatistics`].
#[derive(Debug, Default)]
pub struct StatisticsFold {
    total: u64,
    succeeded: u64,
    failed: u64,
    by_category: BTreeMap<String, u64>,
    by_user: BTreeMap<DbId, u64>,
    emails: BTreeMap<DbId, String>,
    by_hour: BTreeMap<String, u64>,
}

impl StatisticsFold {
    pub fn add(&mut self, entry: &AuditLogEntry) {
        self.total += 1;
        if entry.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        *self
            .by_category
            .entry(entry.category.as_str().to_string())
            .or_default() += 1;
        if let Some(user_id) = entry.user_id {
            *self.by_user.entry(user_id).or_default() += 1;
            if let Some(email) = &entry.user_email {
                self.emails.insert(user_id, email.clone());
            }
        }
        let hour = entry.timestamp.with_timezone(&Local).hour();
        *self.by_hour.entry(format!("{hour:02}")).or_default() += 1;
    }

    pub fn finish(mut self, period: ReportPeriod) -> UsageStatistics {
        let mut top_users: Vec<UserOperationCount> = self
            .by_user
            .iter()
            .map(|(&user_id, &count)| UserOperationCount {
                user_id,
                user_email: self.emails.remove(&user_id),
                count,
            })
            .collect();
        top_users.sort_by(|a, b| b.count.cmp(&a.count).then(a.user_id.cmp(&b.user_id)));
        top_users.truncate(TOP_USERS);

        UsageStatistics {
            period,
            total_operations: self.total,
            successful_operations: self.succeeded,
            failed_operations: self.failed,
            unique_users: self.by_user.len(),
            operations_by_category: self.by_category,
            operations_by_user: self.by_user,
            operations_by_hour: self.by_hour,
            top_users,
            failure_rate: percentage(self.failed, self.total),
        }
    }
}

/// `part / total` as a two-decimal percentage; `"0.00"` when `total` is 0.
fn percentage(part: u64, total: u64) -> String {
    if total == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", part as f64 * 100.0 / total as f64)
}

// ---------------------------------------------------------------------------
// Suspicious activity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    MultipleLoginFailures,
    OffHoursActivity,
    HighFailureRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousPattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub severity: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DbId>,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_rate: Option<String>,
}

/// A failed entry whose action mentions a login.
fn is_login_failure(entry: &AuditLogEntry) -> bool {
    !entry.success && entry.action.to_uppercase().contains("LOGIN")
}

/// Running counters for the suspicious-activity heuristics.
#[derive(Debug, Default)]
pub struct SuspicionFold {
    login_failures_by_ip: BTreeMap<String, u64>,
    off_hours: u64,
    by_user: BTreeMap<DbId, (u64, u64)>,
}

impl SuspicionFold {
    pub fn add(&mut self, entry: &AuditLogEntry) {
        if is_login_failure(entry) {
            if let Some(ip) = &entry.ip_address {
                *self.login_failures_by_ip.entry(ip.clone()).or_default() += 1;
            }
        }
        if OFF_HOURS.contains(&entry.timestamp.with_timezone(&Local).hour()) {
            self.off_hours += 1;
        }
        if let Some(user_id) = entry.user_id {
            let (total, failed) = self.by_user.entry(user_id).or_default();
            *total += 1;
            if !entry.success {
                *failed += 1;
            }
        }
    }

    pub fn finish(self) -> Vec<SuspiciousPattern> {
        let mut patterns = Vec::new();

        for (ip, count) in self.login_failures_by_ip {
            if count >= LOGIN_FAILURE_THRESHOLD {
                patterns.push(SuspiciousPattern {
                    kind: PatternKind::MultipleLoginFailures,
                    severity: Severity::High,
                    description: format!("{count} failed login attempts from IP {ip}"),
                    ip_address: Some(ip),
                    user_id: None,
                    count,
                    failure_rate: None,
                });
            }
        }

        if self.off_hours > OFF_HOURS_THRESHOLD {
            patterns.push(SuspiciousPattern {
                kind: PatternKind::OffHoursActivity,
                severity: Severity::Medium,
                description: format!(
                    "{} operations between {:02}:00 and {:02}:59",
                    self.off_hours,
                    OFF_HOURS.start(),
                    OFF_HOURS.end()
                ),
                ip_address: None,
                user_id: None,
                count: self.off_hours,
                failure_rate: None,
            });
        }

        for (user_id, (total, failed)) in self.by_user {
            if total >= HIGH_FAILURE_MIN_OPERATIONS
                && failed as f64 / total as f64 >= HIGH_FAILURE_RATIO
            {
                let rate = percentage(failed, total);
                patterns.push(SuspiciousPattern {
                    kind: PatternKind::HighFailureRate,
                    severity: Severity::Medium,
                    description: format!(
                        "User {user_id} failed {failed} of {total} operations ({rate}%)"
                    ),
                    ip_address: None,
                    user_id: Some(user_id),
                    count: total,
                    failure_rate: Some(rate),
                });
            }
        }

        patterns
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Answers analytical queries over the `audit` stream.
#[derive(Clone)]
pub struct AuditReportEngine {
    sink: Arc<dyn LogSink>,
    recorder: AuditRecorder,
}

impl AuditReportEngine {
    /// Read from the recorder's sink and report failures through it.
    pub fn new(recorder: AuditRecorder) -> Self {
        Self {
            sink: Arc::clone(recorder.sink()),
            recorder,
        }
    }

    /// Parsed entries of the audit stream; malformed lines are dropped.
    fn entries(&self) -> BoxStream<'static, Result<AuditLogEntry, AuditError>> {
        self.sink
            .scan(LogStream::Audit)
            .try_filter_map(|line| async move {
                Ok(serde_json::from_str::<AuditLogEntry>(&line).ok())
            })
            .boxed()
    }

    /// Fold every entry matching `filters` into `acc`.
    async fn fold<A, F>(
        &self,
        context: &str,
        filters: &ReportFilters,
        mut acc: A,
        mut f: F,
    ) -> Result<A, AuditError>
    where
        F: FnMut(&mut A, AuditLogEntry),
    {
        let mut entries = self.entries();
        while let Some(item) = entries.next().await {
            match item {
                Ok(entry) if filters.matches(&entry) => f(&mut acc, entry),
                Ok(_) => {}
                Err(e) => return Err(self.fail(context, e).await),
            }
        }
        Ok(acc)
    }

    async fn fail(&self, context: &str, err: AuditError) -> AuditError {
        if let Err(log_err) = self.recorder.log_system_error(context, &err).await {
            tracing::error!(context, error = %log_err, "Failed to record report failure");
        }
        err
    }

    /// Matching entries, newest first.
    pub async fn generate_audit_report(
        &self,
        filters: &ReportFilters,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let mut entries = self
            .fold(
                "generate_audit_report",
                filters,
                Vec::<AuditLogEntry>::new(),
                |acc, entry| acc.push(entry),
            )
            .await?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    pub async fn generate_user_activity_report(
        &self,
        user_id: DbId,
        days: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        self.generate_user_activity_report_at(Utc::now(), user_id, days)
            .await
    }

    pub async fn generate_user_activity_report_at(
        &self,
        now: Timestamp,
        user_id: DbId,
        days: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let filters = ReportFilters {
            user_id: Some(user_id),
            ..ReportFilters::window(now, days_window(days))
        };
        self.generate_audit_report(&filters).await
    }

    pub async fn generate_security_report(
        &self,
        hours: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        self.generate_security_report_at(Utc::now(), hours).await
    }

    pub async fn generate_security_report_at(
        &self,
        now: Timestamp,
        hours: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let filters = ReportFilters {
            category: Some(AuditCategory::Security),
            ..ReportFilters::window(now, hours_window(hours))
        };
        self.generate_audit_report(&filters).await
    }

    pub async fn generate_usage_statistics(
        &self,
        days: i64,
    ) -> Result<UsageStatistics, AuditError> {
        self.generate_usage_statistics_at(Utc::now(), days).await
    }

    pub async fn generate_usage_statistics_at(
        &self,
        now: Timestamp,
        days: i64,
    ) -> Result<UsageStatistics, AuditError> {
        let filters = ReportFilters::window(now, days_window(days));
        let fold = self
            .fold(
                "generate_usage_statistics",
                &filters,
                StatisticsFold::default(),
                |acc, entry| acc.add(&entry),
            )
            .await?;
        Ok(fold.finish(ReportPeriod {
            start: window_start(now, days_window(days)),
            end: now,
            days,
        }))
    }

    pub async fn detect_suspicious_activity(&self) -> Result<Vec<SuspiciousPattern>, AuditError> {
        self.detect_suspicious_activity_at(Utc::now()).await
    }

    /// Scan the 24 hours before `now` and record each detected pattern as a
    /// SECURITY entry.
    pub async fn detect_suspicious_activity_at(
        &self,
        now: Timestamp,
    ) -> Result<Vec<SuspiciousPattern>, AuditError> {
        let filters = ReportFilters::window(now, Duration::hours(24));
        let patterns = self
            .fold(
                "detect_suspicious_activity",
                &filters,
                SuspicionFold::default(),
                |acc, entry| acc.add(&entry),
            )
            .await?
            .finish();

        let ctx = AuditContext::system();
        for pattern in &patterns {
            let details = AuditDetails::fields(serde_json::to_value(pattern)?);
            self.recorder
                .log_security(&ctx, ACTION_SUSPICIOUS_ACTIVITY, Outcome::Success, details)
                .await?;
        }
        if !patterns.is_empty() {
            tracing::warn!(count = patterns.len(), "Suspicious activity detected");
        }
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use biblioteca_core::audit::RequestMeta;
    use chrono::TimeZone;

    use super::*;
    use crate::sink::MemoryLogSink;

    fn engine() -> (Arc<MemoryLogSink>, AuditReportEngine) {
        let sink = Arc::new(MemoryLogSink::new());
        let recorder = AuditRecorder::new(sink.clone());
        (sink, AuditReportEngine::new(recorder))
    }

    fn push(sink: &MemoryLogSink, entry: &AuditLogEntry) {
        sink.push_raw(LogStream::Audit, serde_json::to_string(entry).unwrap());
    }

    fn entry_at(
        ts: Timestamp,
        category: AuditCategory,
        action: &str,
        success: bool,
    ) -> AuditLogEntry {
        AuditLogEntry::new(category, action, success).with_timestamp(ts)
    }

    fn login_failure(ts: Timestamp, ip: &str) -> AuditLogEntry {
        entry_at(ts, AuditCategory::Auth, "LOGIN", false).with_request_meta(&RequestMeta {
            ip_address: Some(ip.to_string()),
            user_agent: None,
        })
    }

    /// The latest `hour`:30 local time that is not after `now`.
    fn local_hour_before(now: Timestamp, hour: u32) -> Timestamp {
        let today = now.with_timezone(&Local).date_naive();
        let at = |day: chrono::NaiveDate| {
            Local
                .from_local_datetime(&day.and_hms_opt(hour, 30, 0).unwrap())
                .earliest()
                .unwrap()
                .with_timezone(&Utc)
        };
        let candidate = at(today);
        if candidate <= now {
            candidate
        } else {
            at(today.pred_opt().unwrap())
        }
    }

    #[test]
    fn filters_match_all_predicates() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = entry_at(ts, AuditCategory::BookManagement, "BOOK_DELETED", true)
            .with_actor(&biblioteca_core::audit::Actor::user(7, None, None));

        assert!(ReportFilters::default().matches(&entry));
        let bounded = ReportFilters {
            start_date: Some(ts),
            end_date: Some(ts),
            ..ReportFilters::default()
        };
        assert!(bounded.matches(&entry), "bounds are inclusive");
        let by_action = ReportFilters {
            action: Some("DELETE".into()),
            user_id: Some(7),
            category: Some(AuditCategory::BookManagement),
            success: Some(true),
            ..ReportFilters::default()
        };
        assert!(by_action.matches(&entry));
        assert!(!ReportFilters {
            user_id: Some(8),
            ..ReportFilters::default()
        }
        .matches(&entry));
        assert!(!ReportFilters {
            ip_address: Some("1.1.1.1".into()),
            ..ReportFilters::default()
        }
        .matches(&entry));
    }

    #[tokio::test]
    async fn report_skips_malformed_lines_and_sorts_newest_first() {
        let (sink, engine) = engine();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        push(&sink, &entry_at(t0, AuditCategory::System, "A", true));
        sink.push_raw(LogStream::Audit, "{not json");
        sink.push_raw(LogStream::Audit, "");
        push(
            &sink,
            &entry_at(t0 + Duration::hours(2), AuditCategory::System, "B", true),
        );
        push(
            &sink,
            &entry_at(t0 + Duration::hours(1), AuditCategory::System, "C", true),
        );

        let report = engine
            .generate_audit_report(&ReportFilters::default())
            .await
            .unwrap();
        let actions: Vec<&str> = report.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn security_report_only_returns_recent_security_entries() {
        let (sink, engine) = engine();
        let now = Utc::now();
        push(
            &sink,
            &entry_at(
                now - Duration::hours(1),
                AuditCategory::Security,
                "SECURITY_ALERT",
                false,
            ),
        );
        push(
            &sink,
            &entry_at(
                now - Duration::hours(30),
                AuditCategory::Security,
                "SECURITY_ALERT",
                false,
            ),
        );
        push(
            &sink,
            &entry_at(
                now - Duration::hours(1),
                AuditCategory::Auth,
                "LOGIN",
                false,
            ),
        );

        let report = engine.generate_security_report_at(now, 24).await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].category, AuditCategory::Security);
    }

    #[tokio::test]
    async fn user_activity_report_filters_by_user_and_window() {
        let (sink, engine) = engine();
        let now = Utc::now();
        let actor = biblioteca_core::audit::Actor::user(3, None, None);
        push(
            &sink,
            &entry_at(
                now - Duration::days(1),
                AuditCategory::DataAccess,
                "READ",
                true,
            )
            .with_actor(&actor),
        );
        push(
            &sink,
            &entry_at(
                now - Duration::days(40),
                AuditCategory::DataAccess,
                "READ",
                true,
            )
            .with_actor(&actor),
        );
        push(
            &sink,
            &entry_at(
                now - Duration::days(1),
                AuditCategory::DataAccess,
                "READ",
                true,
            ),
        );

        let report = engine
            .generate_user_activity_report_at(now, 3, 30)
            .await
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].user_id, Some(3));
    }

    #[tokio::test]
    async fn empty_window_statistics_are_zero() {
        let (_, engine) = engine();
        let stats = engine.generate_usage_statistics(7).await.unwrap();
        assert_eq!(stats.total_operations, 0);
        assert_eq!(stats.unique_users, 0);
        assert_eq!(stats.failure_rate, "0.00");
        assert!(stats.top_users.is_empty());
        assert!(stats.operations_by_hour.is_empty());
    }

    #[tokio::test]
    async fn statistics_aggregate_the_window() {
        let (sink, engine) = engine();
        let now = Utc::now();
        let ts = now - Duration::hours(3);
        let alice = biblioteca_core::audit::Actor::user(1, Some("alice@x.test".into()), None);
        let bob = biblioteca_core::audit::Actor::user(2, None, None);
        for _ in 0..3 {
            push(
                &sink,
                &entry_at(ts, AuditCategory::BookManagement, "READ", true).with_actor(&alice),
            );
        }
        push(
            &sink,
            &entry_at(ts, AuditCategory::Auth, "LOGIN", false).with_actor(&bob),
        );
        push(
            &sink,
            &entry_at(now - Duration::days(9), AuditCategory::Auth, "LOGIN", false),
        );

        let stats = engine.generate_usage_statistics_at(now, 7).await.unwrap();
        assert_eq!(stats.total_operations, 4);
        assert_eq!(stats.successful_operations, 3);
        assert_eq!(stats.failed_operations, 1);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.failure_rate, "25.00");
        assert_eq!(stats.operations_by_category["BOOK_MANAGEMENT"], 3);
        assert_eq!(stats.operations_by_category["AUTH"], 1);
        assert_eq!(stats.operations_by_user[&1], 3);
        let hour = format!("{:02}", ts.with_timezone(&Local).hour());
        assert_eq!(stats.operations_by_hour[&hour], 4);
        assert_eq!(stats.top_users[0].user_id, 1);
        assert_eq!(
            stats.top_users[0].user_email.as_deref(),
            Some("alice@x.test")
        );
        assert_eq!(stats.top_users[1].user_id, 2);
    }

    #[test]
    fn top_users_are_capped_and_tie_broken_by_id() {
        let mut fold = StatisticsFold::default();
        let ts = Utc::now();
        for user_id in (1..=12).rev() {
            let actor = biblioteca_core::audit::Actor::user(user_id, None, None);
            fold.add(&entry_at(ts, AuditCategory::System, "READ", true).with_actor(&actor));
        }
        let stats = fold.finish(ReportPeriod {
            start: ts,
            end: ts,
            days: 1,
        });
        assert_eq!(stats.top_users.len(), TOP_USERS);
        let ids: Vec<DbId> = stats.top_users.iter().map(|u| u.user_id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        assert_eq!(stats.unique_users, 12);
    }

    #[tokio::test]
    async fn five_login_failures_from_one_ip_are_flagged() {
        let (sink, engine) = engine();
        let now = Utc::now();
        for i in 0..5 {
            push(
                &sink,
                &login_failure(now - Duration::minutes(i), "203.0.113.9"),
            );
        }
        for i in 0..4 {
            push(
                &sink,
                &login_failure(now - Duration::minutes(i), "198.51.100.1"),
            );
        }

        let patterns = engine.detect_suspicious_activity_at(now).await.unwrap();
        let login: Vec<&SuspiciousPattern> = patterns
            .iter()
            .filter(|p| p.kind == PatternKind::MultipleLoginFailures)
            .collect();
        assert_eq!(login.len(), 1);
        assert_eq!(login[0].ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(login[0].count, 5);
        assert_eq!(login[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn detections_are_recorded_as_security_entries() {
        let (sink, engine) = engine();
        let now = Utc::now();
        for i in 0..6 {
            push(
                &sink,
                &login_failure(now - Duration::minutes(i), "203.0.113.9"),
            );
        }
        engine.detect_suspicious_activity_at(now).await.unwrap();

        let security = sink.entries(LogStream::Security);
        assert_eq!(security.len(), 1);
        assert_eq!(security[0].action, ACTION_SUSPICIOUS_ACTIVITY);
        assert_eq!(
            security[0].details.as_ref().unwrap()["type"],
            "MULTIPLE_LOGIN_FAILURES"
        );
    }

    #[tokio::test]
    async fn old_and_successful_logins_are_not_counted() {
        let (sink, engine) = engine();
        let now = Utc::now();
        for i in 0..3 {
            push(
                &sink,
                &login_failure(now - Duration::minutes(i), "203.0.113.9"),
            );
        }
        for i in 0..3 {
            push(
                &sink,
                &login_failure(now - Duration::hours(25 + i), "203.0.113.9"),
            );
        }
        let ok = entry_at(now, AuditCategory::Auth, "LOGIN", true).with_request_meta(&RequestMeta {
            ip_address: Some("203.0.113.9".into()),
            user_agent: None,
        });
        push(&sink, &ok);

        let patterns = engine.detect_suspicious_activity_at(now).await.unwrap();
        let kinds: Vec<PatternKind> = patterns.iter().map(|p| p.kind).collect();
        assert!(!kinds.contains(&PatternKind::MultipleLoginFailures));
    }

    #[tokio::test]
    async fn off_hours_activity_needs_more_than_ten_entries() {
        let now = Utc::now();
        let ts = local_hour_before(now, 3);

        let (sink, engine) = engine();
        for _ in 0..10 {
            push(&sink, &entry_at(ts, AuditCategory::System, "READ", true));
        }
        let patterns = engine.detect_suspicious_activity_at(now).await.unwrap();
        let kinds: Vec<PatternKind> = patterns.iter().map(|p| p.kind).collect();
        assert!(!kinds.contains(&PatternKind::OffHoursActivity));

        push(&sink, &entry_at(ts, AuditCategory::System, "READ", true));
        let patterns = engine.detect_suspicious_activity_at(now).await.unwrap();
        let off_hours = patterns
            .iter()
            .find(|p| p.kind == PatternKind::OffHoursActivity)
            .unwrap();
        assert_eq!(off_hours.count, 11);
        assert_eq!(off_hours.severity, Severity::Medium);
    }

    #[tokio::test]
    async fn high_failure_rate_is_flagged_per_user() {
        let (sink, engine) = engine();
        let now = Utc::now();
        let flaky = biblioteca_core::audit::Actor::user(5, None, None);
        let busy = biblioteca_core::audit::Actor::user(6, None, None);
        for i in 0..10 {
            let ts = now - Duration::minutes(i);
            push(
                &sink,
                &entry_at(ts, AuditCategory::DataAccess, "READ", i % 2 == 0).with_actor(&flaky),
            );
            push(
                &sink,
                &entry_at(ts, AuditCategory::DataAccess, "READ", i != 0).with_actor(&busy),
            );
        }

        let patterns = engine.detect_suspicious_activity_at(now).await.unwrap();
        let high: Vec<&SuspiciousPattern> = patterns
            .iter()
            .filter(|p| p.kind == PatternKind::HighFailureRate)
            .collect();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].user_id, Some(5));
        assert_eq!(high[0].failure_rate.as_deref(), Some("50.00"));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn report_futures_are_send() {
        let (_, engine) = engine();
        let filters = ReportFilters::default();
        assert_send(&engine.generate_audit_report(&filters));
        assert_send(&engine.generate_user_activity_report(1, DEFAULT_ACTIVITY_DAYS));
        assert_send(&engine.generate_security_report(DEFAULT_SECURITY_HOURS));
        assert_send(&engine.generate_usage_statistics(DEFAULT_STATISTICS_DAYS));
        assert_send(&engine.detect_suspicious_activity());
    }

    #[tokio::test]
    async fn oversized_windows_saturate() {
        let (sink, engine) = engine();
        let now = Utc::now();
        push(
            &sink,
            &entry_at(
                now - Duration::days(400),
                AuditCategory::Security,
                "LOGIN",
                false,
            ),
        );

        let stats = engine
            .generate_usage_statistics_at(now, i64::MAX)
            .await
            .unwrap();
        assert_eq!(stats.total_operations, 1);
        assert_eq!(stats.period.start, DateTime::<Utc>::MIN_UTC);

        let security = engine
            .generate_security_report_at(now, 200_000_000_000)
            .await
            .unwrap();
        assert_eq!(security.len(), 1);
    }

    #[tokio::test]
    async fn read_failures_are_logged_and_returned() {
        let recorder_sink = Arc::new(MemoryLogSink::new());
        let failing: Arc<dyn LogSink> = Arc::new(MemoryLogSink::unavailable());
        let engine = AuditReportEngine {
            sink: failing,
            recorder: AuditRecorder::new(recorder_sink.clone()),
        };

        let result = engine
            .generate_audit_report(&ReportFilters::default())
            .await;
        assert_matches!(result, Err(AuditError::Unavailable(_)));

        let errors = recorder_sink.entries(LogStream::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].details.as_ref().unwrap()["context"],
            "generate_audit_report"
        );
    }
}
