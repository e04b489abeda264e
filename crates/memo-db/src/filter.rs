//! Predicate builder for scoped queries.
//!
//! Every query starts from the owner predicate and appends optional
//! predicates, each with a numbered placeholder. Call sites never branch
//! on which filters are present; they render `where_clause()` and bind
//! `params()` in order.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

use memo_core::{AnalyticsWindow, UserScope};

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// Single UUID parameter.
    Uuid(Uuid),
    /// Integer parameter (LIMIT / OFFSET).
    Int(i64),
    /// Timestamp parameter.
    Timestamp(DateTime<Utc>),
    /// String parameter.
    String(String),
}

/// Accumulates `AND`-joined predicates and their parameters.
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    clauses: Vec<String>,
    params: Vec<QueryParam>,
}

impl FilterBuilder {
    /// Start with `owner_column = $1`.
    pub fn owned_by(owner_column: &str, scope: UserScope) -> Self {
        let mut builder = Self {
            clauses: Vec::new(),
            params: Vec::new(),
        };
        let p = builder.push_param(QueryParam::Uuid(scope.user_id()));
        builder.clauses.push(format!("{} = {}", owner_column, p));
        builder
    }

    /// Register a parameter and return its placeholder (`$n`).
    pub fn push_param(&mut self, param: QueryParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    /// `column = $n` when `value` is present.
    pub fn eq_uuid(mut self, column: &str, value: Option<Uuid>) -> Self {
        if let Some(id) = value {
            let p = self.push_param(QueryParam::Uuid(id));
            self.clauses.push(format!("{} = {}", column, p));
        }
        self
    }

    /// `column = $n` when `value` is present.
    pub fn eq_text(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(text) = value {
            let p = self.push_param(QueryParam::String(text.to_string()));
            self.clauses.push(format!("{} = {}", column, p));
        }
        self
    }

    /// `column >= start AND column <= end` for whichever bounds are set.
    pub fn within(mut self, column: &str, window: &AnalyticsWindow) -> Self {
        if let Some(start) = window.start {
            let p = self.push_param(QueryParam::Timestamp(start));
            self.clauses.push(format!("{} >= {}", column, p));
        }
        if let Some(end) = window.end {
            let p = self.push_param(QueryParam::Timestamp(end));
            self.clauses.push(format!("{} <= {}", column, p));
        }
        self
    }

    /// The clause body, without the `WHERE` keyword.
    pub fn where_clause(&self) -> String {
        self.clauses.join(" AND ")
    }

    /// Render `LIMIT $n OFFSET $m`, registering both values.
    pub fn limit_offset(&mut self, limit: i64, offset: i64) -> String {
        let l = self.push_param(QueryParam::Int(limit));
        let o = self.push_param(QueryParam::Int(offset));
        format!("LIMIT {} OFFSET {}", l, o)
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }
}

/// Bind parameters onto a query in placeholder order.
pub fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &[QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        q = match param {
            QueryParam::Uuid(id) => q.bind(*id),
            QueryParam::Int(val) => q.bind(*val),
            QueryParam::Timestamp(ts) => q.bind(*ts),
            QueryParam::String(s) => q.bind(s.clone()),
        };
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn scope() -> UserScope {
        UserScope::new(Uuid::nil())
    }

    #[test]
    fn test_owner_predicate_only() {
        let f = FilterBuilder::owned_by("e.user_id", scope());
        assert_eq!(f.where_clause(), "e.user_id = $1");
        assert_eq!(f.params(), &[QueryParam::Uuid(Uuid::nil())]);
    }

    #[test]
    fn test_absent_optionals_add_nothing() {
        let f = FilterBuilder::owned_by("e.user_id", scope())
            .eq_uuid("e.category_id", None)
            .eq_text("e.status", None)
            .within("e.created_at", &AnalyticsWindow::unbounded());
        assert_eq!(f.where_clause(), "e.user_id = $1");
        assert_eq!(f.params().len(), 1);
    }

    #[test]
    fn test_placeholders_are_sequential() {
        let cat = Uuid::new_v4();
        let f = FilterBuilder::owned_by("e.user_id", scope())
            .eq_uuid("e.category_id", Some(cat))
            .eq_text("e.status", Some("draft"));
        assert_eq!(
            f.where_clause(),
            "e.user_id = $1 AND e.category_id = $2 AND e.status = $3"
        );
        assert_eq!(f.params()[1], QueryParam::Uuid(cat));
        assert_eq!(f.params()[2], QueryParam::String("draft".into()));
    }

    #[test]
    fn test_window_bounds() {
        let end = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        let window = AnalyticsWindow::between(Some(end - Duration::days(7)), Some(end)).unwrap();
        let f = FilterBuilder::owned_by("e.user_id", scope()).within("m.created_at", &window);
        assert_eq!(
            f.where_clause(),
            "e.user_id = $1 AND m.created_at >= $2 AND m.created_at <= $3"
        );
    }

    #[test]
    fn test_open_ended_window() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let window = AnalyticsWindow::between(Some(start), None).unwrap();
        let f = FilterBuilder::owned_by("e.user_id", scope()).within("e.created_at", &window);
        assert_eq!(f.where_clause(), "e.user_id = $1 AND e.created_at >= $2");
    }

    #[test]
    fn test_limit_offset_follows_filters() {
        let mut f = FilterBuilder::owned_by("c.user_id", scope()).eq_text("c.name", Some("health"));
        let tail = f.limit_offset(100, 20);
        assert_eq!(tail, "LIMIT $3 OFFSET $4");
        assert_eq!(f.params()[2], QueryParam::Int(100));
        assert_eq!(f.params()[3], QueryParam::Int(20));
    }
}
