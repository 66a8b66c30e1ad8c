//! Internal helpers for dynamically-built search queries.

use biblioteca_core::lifecycle::LifecycleState;
use biblioteca_core::search::like_pattern;
use biblioteca_core::types::DbId;

/// Typed bind value for dynamically-built queries.
pub(crate) enum BindValue {
    BigInt(i64),
    Text(String),
    Bool(bool),
}

/// Accumulates `AND`-joined conditions and their bind values.
pub(crate) struct Conditions {
    conditions: Vec<String>,
    binds: Vec<BindValue>,
    next_idx: u32,
}

impl Conditions {
    pub(crate) fn new() -> Self {
        Self {
            conditions: Vec::new(),
            binds: Vec::new(),
            next_idx: 1,
        }
    }

    /// Accent- and case-insensitive partial match on `column`.
    pub(crate) fn text_match(&mut self, column: &str, needle: Option<&str>) {
        let Some(needle) = needle.map(str::trim).filter(|n| !n.is_empty()) else {
            return;
        };
        let condition = format!("unaccent({column}) ILIKE unaccent(${})", self.next_idx);
        self.conditions.push(condition);
        self.push(BindValue::Text(like_pattern(needle)));
    }

    pub(crate) fn eq_id(&mut self, column: &str, value: Option<DbId>) {
        if let Some(v) = value {
            self.conditions
                .push(format!("{column} = ${}", self.next_idx));
            self.push(BindValue::BigInt(v));
        }
    }

    pub(crate) fn eq_bool(&mut self, column: &str, value: Option<bool>) {
        if let Some(v) = value {
            self.conditions
                .push(format!("{column} = ${}", self.next_idx));
            self.push(BindValue::Bool(v));
        }
    }

    pub(crate) fn eq_text(&mut self, column: &str, value: Option<&str>) {
        if let Some(v) = value {
            self.conditions
                .push(format!("{column} = ${}", self.next_idx));
            self.push(BindValue::Text(v.to_string()));
        }
    }

    /// Restrict to rows whose joined status name matches `state`.
    pub(crate) fn state(&mut self, state: Option<LifecycleState>) {
        self.eq_text("s.name", state.map(LifecycleState::as_str));
    }

    fn push(&mut self, value: BindValue) {
        self.binds.push(value);
        self.next_idx += 1;
    }

    /// Returns `(where_clause, bind_values, next_bind_index)`.
    /// The `where_clause` is empty if no filters are active, or starts with `WHERE `.
    pub(crate) fn finish(self) -> (String, Vec<BindValue>, u32) {
        let where_clause = if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        };
        (where_clause, self.binds, self.next_idx)
    }
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
pub(crate) fn bind_values<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Bool(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a sqlx `QueryScalar`.
pub(crate) fn bind_values_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Bool(v) => q = q.bind(*v),
        }
    }
    q
}

/// Sort key putting active rows before deleted ones.
pub(crate) const STATE_ORDER: &str = "CASE WHEN s.name = 'active' THEN 0 ELSE 1 END";
