//! Search, filtering, and pagination helpers shared by every listing.

use serde::Serialize;

use crate::error::CoreError;
use crate::lifecycle::LifecycleState;

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Default page number (1-based).
pub const DEFAULT_PAGE: i64 = 1;

/// Default number of results per page.
pub const DEFAULT_LIMIT: i64 = 10;

/// Maximum number of results per page.
pub const MAX_LIMIT: i64 = 100;

/// Highest page number honoured; larger requests are clamped to it.
pub const MAX_PAGE: i64 = 1_000_000;

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Build from optional query values, clamping into the valid range.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// `ceil(total / limit)`; zero when there are no rows.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages: total_pages(total, pagination.limit),
        }
    }
}

// ---------------------------------------------------------------------------
// Status filter
// ---------------------------------------------------------------------------

/// Parse the `estado` query value.
///
/// Accepts the Spanish labels used by the admin UI (`activo`, `eliminado`)
/// and the status names themselves (`active`, `deleted`).
pub fn parse_estado(value: &str) -> Result<LifecycleState, CoreError> {
    match value.trim().to_lowercase().as_str() {
        "activo" | "active" => Ok(LifecycleState::Active),
        "eliminado" | "deleted" => Ok(LifecycleState::Deleted),
        other => Err(CoreError::Validation(format!(
            "estado must be 'activo' or 'eliminado', got '{other}'"
        ))),
    }
}

/// Display label of a state in exports.
pub fn estado_label(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::Active => "Activo",
        LifecycleState::Deleted => "Eliminado",
    }
}

// ---------------------------------------------------------------------------
// Text matching
// ---------------------------------------------------------------------------

/// Lowercase `s` and strip the diacritics that PostgreSQL's `unaccent`
/// removes for Spanish text, so in-process filtering matches the SQL path.
pub fn fold_accents(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Case- and accent-insensitive partial match. An empty needle matches.
pub fn matches_text(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || fold_accents(haystack).contains(&fold_accents(needle))
}

/// Optional filter helper: `None` matches everything.
pub fn matches_optional(haystack: &str, needle: Option<&str>) -> bool {
    needle.map_or(true, |n| matches_text(haystack, n))
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern and wrap the
/// value in `%...%`.
pub fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
