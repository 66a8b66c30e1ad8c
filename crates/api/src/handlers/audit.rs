//! Handlers for the audit report endpoints. All require the admin role.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use biblioteca_audit::report::{
    DEFAULT_ACTIVITY_DAYS, DEFAULT_SECURITY_HOURS, DEFAULT_STATISTICS_DAYS,
};
use biblioteca_audit::{ReportFilters, SuspiciousPattern, UsageStatistics};
use biblioteca_core::audit::{AuditCategory, AuditLogEntry};
use biblioteca_core::types::{DbId, Timestamp};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest `days` window a report accepts (about ten years).
pub const MAX_WINDOW_DAYS: i64 = 3650;
/// Longest `hours` window a report accepts (one year).
pub const MAX_WINDOW_HOURS: i64 = 8760;

// ---------------------------------------------------------------------------
// Query parameter types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /audit/report`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    /// RFC 3339 timestamp or `YYYY-MM-DD` (start of day, UTC).
    pub start_date: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (end of day, UTC).
    pub end_date: Option<String>,
    pub user_id: Option<DbId>,
    pub category: Option<String>,
    pub action: Option<String>,
    pub success: Option<bool>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HoursQuery {
    pub hours: Option<i64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum DayBound {
    Start,
    End,
}

fn invalid_date(value: &str) -> AppError {
    let message = format!("Invalid date '{value}'. Expected RFC 3339 or YYYY-MM-DD");
    AppError::BadRequest(message)
}

/// Parse a report bound. Bare dates expand to the first or last instant of
/// that day.
fn parse_bound(value: &str, bound: DayBound) -> AppResult<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid_date(value))?;
    let instant = match bound {
        DayBound::Start => date.and_hms_opt(0, 0, 0),
        DayBound::End => date.and_hms_milli_opt(23, 59, 59, 999),
    };
    instant
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid date '{value}'")))
}

/// A report window in `1..=max`, or `default` when absent.
fn window(value: Option<i64>, default: i64, max: i64, name: &str) -> AppResult<i64> {
    match value {
        None => Ok(default),
        Some(v) if (1..=max).contains(&v) => Ok(v),
        Some(v) => Err(AppError::BadRequest(format!(
            "{name} must be between 1 and {max}, got {v}"
        ))),
    }
}

impl ReportQuery {
    fn into_filters(self) -> AppResult<ReportFilters> {
        let start_date = self
            .start_date
            .as_deref()
            .map(|v| parse_bound(v, DayBound::Start))
            .transpose()?;
        let end_date = self
            .end_date
            .as_deref()
            .map(|v| parse_bound(v, DayBound::End))
            .transpose()?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(AppError::BadRequest("startDate must not be after endDate".into()));
            }
        }
        let category = self
            .category
            .as_deref()
            .map(AuditCategory::from_str)
            .transpose()
            .map_err(AppError::BadRequest)?;

        Ok(ReportFilters {
            start_date,
            end_date,
            user_id: self.user_id,
            category,
            action: self.action,
            success: self.success,
            ip_address: self.ip_address,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/audit/report
///
/// Filtered audit entries, newest first.
pub async fn report(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<DataResponse<Vec<AuditLogEntry>>>> {
    let filters = query.into_filters()?;
    let entries = state.reports.generate_audit_report(&filters).await?;
    Ok(Json(DataResponse::new(entries)))
}

/// GET /api/v1/audit/users/{id}/activity?days=30
pub async fn user_activity(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(user_id): Path<DbId>,
    Query(query): Query<DaysQuery>,
) -> AppResult<Json<DataResponse<Vec<AuditLogEntry>>>> {
    let days = window(query.days, DEFAULT_ACTIVITY_DAYS, MAX_WINDOW_DAYS, "days")?;
    let entries = state
        .reports
        .generate_user_activity_report(user_id, days)
        .await?;
    Ok(Json(DataResponse::new(entries)))
}

/// GET /api/v1/audit/security?hours=24
pub async fn security(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<HoursQuery>,
) -> AppResult<Json<DataResponse<Vec<AuditLogEntry>>>> {
    let hours = window(
        query.hours,
        DEFAULT_SECURITY_HOURS,
        MAX_WINDOW_HOURS,
        "hours",
    )?;
    let entries = state.reports.generate_security_report(hours).await?;
    Ok(Json(DataResponse::new(entries)))
}

/// GET /api/v1/audit/statistics?days=7
pub async fn statistics(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<DaysQuery>,
) -> AppResult<Json<DataResponse<UsageStatistics>>> {
    let days = window(query.days, DEFAULT_STATISTICS_DAYS, MAX_WINDOW_DAYS, "days")?;
    let stats = state.reports.generate_usage_statistics(days).await?;
    Ok(Json(DataResponse::new(stats)))
}

/// GET /api/v1/audit/suspicious-activity
///
/// Scan the last 24 hours. Each detection is also recorded as a SECURITY
/// entry.
pub async fn suspicious_activity(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<SuspiciousPattern>>>> {
    let patterns = state.reports.detect_suspicious_activity().await?;
    Ok(Json(DataResponse::new(patterns)))
}
