//! Request classification for the audit instrumentation.
//!
//! Pure functions over the HTTP method, the path (relative to the API
//! prefix), the response status, and the error message. The middleware in the
//! API crate calls these and decides what to record.

use crate::audit::{AuditCategory, AuditLevel};
use crate::types::DbId;

/// Operation tags written to the `action` field of request-level entries.
pub mod operations {
    pub const LOGIN: &str = "LOGIN";
    pub const REGISTER: &str = "REGISTER";
    pub const SEARCH: &str = "SEARCH";
    pub const EXPORT: &str = "EXPORT";
    pub const RESTORE: &str = "RESTORE";
    pub const UPLOAD_IMAGE: &str = "UPLOAD_IMAGE";
    pub const AUDIT_REPORT: &str = "AUDIT_REPORT";
    pub const USER_ACTIVITY_REPORT: &str = "USER_ACTIVITY_REPORT";
    pub const SECURITY_REPORT: &str = "SECURITY_REPORT";
    pub const USAGE_STATISTICS: &str = "USAGE_STATISTICS";
    pub const SUSPICIOUS_ACTIVITY_CHECK: &str = "SUSPICIOUS_ACTIVITY_CHECK";
    pub const READ: &str = "READ";
    pub const CREATE: &str = "CREATE";
    pub const UPDATE: &str = "UPDATE";
    pub const DELETE: &str = "DELETE";
    pub const UNKNOWN: &str = "UNKNOWN";
}

/// Resource type segments as they appear in request paths.
pub mod resources {
    pub const AUTH: &str = "auth";
    pub const BOOKS: &str = "libros";
    pub const GENRES: &str = "generos";
    pub const USERS: &str = "usuarios";
    pub const AUDIT: &str = "audit";
}

/// Requests slower than this get a performance entry.
pub const DEFAULT_SLOW_OPERATION_MS: u64 = 3000;

/// Requests slower than this get a `warn` performance entry instead of `info`.
pub const DEFAULT_CRITICAL_OPERATION_MS: u64 = 5000;

/// Named operations, checked in order against the lowercase path. The first
/// match wins over the verb-derived tag.
const NAMED_OPERATIONS: &[(&str, &str)] = &[
    ("/login", operations::LOGIN),
    ("/register", operations::REGISTER),
    ("/audit/report", operations::AUDIT_REPORT),
    ("/activity", operations::USER_ACTIVITY_REPORT),
    ("/audit/security", operations::SECURITY_REPORT),
    ("/audit/statistics", operations::USAGE_STATISTICS),
    ("/suspicious", operations::SUSPICIOUS_ACTIVITY_CHECK),
    ("/search", operations::SEARCH),
    ("/buscar", operations::SEARCH),
    ("/export", operations::EXPORT),
    ("/restore", operations::RESTORE),
    ("/restaurar", operations::RESTORE),
    ("/imagen", operations::UPLOAD_IMAGE),
    ("/upload", operations::UPLOAD_IMAGE),
];

/// Derive the operation tag for a request.
pub fn classify_operation(method: &str, path: &str) -> &'static str {
    let lower = path.to_lowercase();
    if let Some((_, tag)) = NAMED_OPERATIONS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
    {
        return tag;
    }
    match method.to_ascii_uppercase().as_str() {
        "GET" | "HEAD" => operations::READ,
        "POST" => operations::CREATE,
        "PUT" | "PATCH" => operations::UPDATE,
        "DELETE" => operations::DELETE,
        _ => operations::UNKNOWN,
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('?')
        .next()
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.is_empty())
}

fn is_numeric(segment: &str) -> bool {
    segment.bytes().all(|b| b.is_ascii_digit())
}

/// First non-numeric path segment, e.g. `/libros/7` -> `libros`.
pub fn resource_type(path: &str) -> Option<&str> {
    segments(path).find(|s| !is_numeric(s))
}

/// First numeric path segment, e.g. `/libros/7/restore` -> `7`.
pub fn resource_id(path: &str) -> Option<DbId> {
    segments(path)
        .find(|s| is_numeric(s))
        .and_then(|s| s.parse().ok())
}

/// Map a resource type segment to the audit category its entries go to.
pub fn category_for_resource(resource_type: Option<&str>) -> AuditCategory {
    match resource_type {
        Some(resources::AUTH) => AuditCategory::Auth,
        Some(resources::USERS | "users") => AuditCategory::UserManagement,
        Some(resources::BOOKS | "books") => AuditCategory::BookManagement,
        Some(resources::GENRES | "genres") => AuditCategory::GenreManagement,
        _ => AuditCategory::System,
    }
}

/// HTTP statuses that always warrant a SECURITY entry.
const SECURITY_STATUSES: &[u16] = &[401, 403, 404, 429];

/// Path fragments of authentication endpoints.
const AUTH_PATH_PATTERNS: &[&str] = &["/auth/", "/login", "/register"];

/// Error message fragments that indicate an authn/authz problem.
const SECURITY_MESSAGE_PATTERNS: &[&str] = &["unauthorized", "forbidden", "token"];

/// Whether a failed request should additionally be recorded as a SECURITY
/// event.
pub fn is_security_relevant(status: u16, path: &str, message: Option<&str>) -> bool {
    if SECURITY_STATUSES.contains(&status) {
        return true;
    }
    let lower_path = path.to_lowercase();
    if AUTH_PATH_PATTERNS.iter().any(|p| lower_path.contains(p)) {
        return true;
    }
    message
        .map(|m| m.to_lowercase())
        .is_some_and(|m| SECURITY_MESSAGE_PATTERNS.iter().any(|p| m.contains(p)))
}

/// Level of the performance entry for a request, or `None` when it was fast
/// enough not to need one.
pub fn performance_level(duration_ms: u64, slow_ms: u64, critical_ms: u64) -> Option<AuditLevel> {
    if duration_ms > critical_ms {
        Some(AuditLevel::Warn)
    } else if duration_ms > slow_ms {
        Some(AuditLevel::Info)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_operations_take_precedence_over_verbs() {
        assert_eq!(classify_operation("POST", "/auth/login"), operations::LOGIN);
        assert_eq!(
            classify_operation("POST", "/auth/register"),
            operations::REGISTER
        );
        assert_eq!(
            classify_operation("POST", "/libros/4/restore"),
            operations::RESTORE
        );
        assert_eq!(
            classify_operation("GET", "/libros/export"),
            operations::EXPORT
        );
        assert_eq!(
            classify_operation("GET", "/libros/search?title=x"),
            operations::SEARCH
        );
        assert_eq!(
            classify_operation("POST", "/libros/4/imagen"),
            operations::UPLOAD_IMAGE
        );
    }

    #[test]
    fn report_operations() {
        assert_eq!(
            classify_operation("GET", "/audit/report"),
            operations::AUDIT_REPORT
        );
        assert_eq!(
            classify_operation("GET", "/audit/users/3/activity"),
            operations::USER_ACTIVITY_REPORT
        );
        assert_eq!(
            classify_operation("GET", "/audit/security"),
            operations::SECURITY_REPORT
        );
        assert_eq!(
            classify_operation("GET", "/audit/statistics"),
            operations::USAGE_STATISTICS
        );
        assert_eq!(
            classify_operation("GET", "/audit/suspicious-activity"),
            operations::SUSPICIOUS_ACTIVITY_CHECK
        );
    }

    #[test]
    fn verb_based_fallbacks() {
        assert_eq!(classify_operation("GET", "/libros/7"), operations::READ);
        assert_eq!(classify_operation("post", "/generos"), operations::CREATE);
        assert_eq!(classify_operation("PUT", "/usuarios/2"), operations::UPDATE);
        assert_eq!(
            classify_operation("PATCH", "/usuarios/2"),
            operations::UPDATE
        );
        assert_eq!(
            classify_operation("DELETE", "/libros/7"),
            operations::DELETE
        );
        assert_eq!(
            classify_operation("OPTIONS", "/libros"),
            operations::UNKNOWN
        );
    }

    #[test]
    fn resource_type_and_id_from_path() {
        assert_eq!(resource_type("/libros/7"), Some("libros"));
        assert_eq!(resource_id("/libros/7"), Some(7));
        assert_eq!(resource_type("/7/libros"), Some("libros"));
        assert_eq!(resource_id("/libros?page=2"), None);
        assert_eq!(resource_type("/"), None);
        assert_eq!(resource_id("/audit/users/12/activity"), Some(12));
    }

    #[test]
    fn categories_by_resource() {
        assert_eq!(category_for_resource(Some("auth")), AuditCategory::Auth);
        assert_eq!(
            category_for_resource(Some("libros")),
            AuditCategory::BookManagement
        );
        assert_eq!(
            category_for_resource(Some("generos")),
            AuditCategory::GenreManagement
        );
        assert_eq!(
            category_for_resource(Some("usuarios")),
            AuditCategory::UserManagement
        );
        assert_eq!(category_for_resource(Some("audit")), AuditCategory::System);
        assert_eq!(category_for_resource(None), AuditCategory::System);
    }

    #[test]
    fn security_relevance() {
        assert!(is_security_relevant(401, "/libros", None));
        assert!(is_security_relevant(403, "/usuarios", None));
        assert!(is_security_relevant(404, "/libros/99", None));
        assert!(is_security_relevant(429, "/libros", None));
        assert!(is_security_relevant(400, "/auth/login", None));
        assert!(is_security_relevant(500, "/libros", Some("Invalid token signature")));
        assert!(!is_security_relevant(409, "/libros/1", Some("already deleted")));
        assert!(!is_security_relevant(400, "/generos", Some("name is required")));
    }

    #[test]
    fn performance_thresholds() {
        let slow = DEFAULT_SLOW_OPERATION_MS;
        let critical = DEFAULT_CRITICAL_OPERATION_MS;
        assert_eq!(performance_level(120, slow, critical), None);
        assert_eq!(performance_level(3000, slow, critical), None);
        assert_eq!(
            performance_level(3001, slow, critical),
            Some(AuditLevel::Info)
        );
        assert_eq!(
            performance_level(5000, slow, critical),
            Some(AuditLevel::Info)
        );
        assert_eq!(
            performance_level(5001, slow, critical),
            Some(AuditLevel::Warn)
        );
    }
}
