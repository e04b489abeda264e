//! Analytics queries.
//!
//! SQL does the grouping; tie-breaks, percentages and zero-filling are done
//! by the pure helpers in `memo_core::analytics`. Every query starts from
//! the caller's owner predicate.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};

use crate::filter::{bind_params, FilterBuilder};
use memo_core::analytics::{
    average_per_day, category_shares, days_in_range, fill_daily_counts, metric_category_shares,
    most_active_day, most_used, MetricGroup,
};
use memo_core::defaults::{
    DASHBOARD_DAYS, DASHBOARD_RECENT_ENTRIES, REPORT_SERIES_MAX_DAYS, TOP_METRICS_LIMIT_MAX,
};
use memo_core::{
    AnalyticsReport, AnalyticsRepository, AnalyticsWindow, CategoryEntryCount, DailyCount,
    Dashboard, Error, LabelCount, MetricFilter, MetricSummary, MetricsByCategory, NamedRange,
    RankedMetric, RecentEntry, Result, TagCount, TrendPoint, UserScope,
};

/// Entries owned by the caller and created inside `window`.
fn entry_filter(scope: UserScope, window: &AnalyticsWindow) -> FilterBuilder {
    FilterBuilder::owned_by("e.user_id", scope).within("e.created_at", window)
}

/// Metrics owned by the caller, narrowed by the optional filters.
///
/// Expects `metric m JOIN entry e LEFT JOIN category c`.
fn metric_filter(scope: UserScope, filter: &MetricFilter) -> FilterBuilder {
    FilterBuilder::owned_by("e.user_id", scope)
        .eq_text("c.name", filter.category.as_deref())
        .eq_text("m.metric_name", filter.metric_name.as_deref())
        .within("m.created_at", &filter.window)
}

/// PostgreSQL implementation of AnalyticsRepository.
#[derive(Clone)]
pub struct PgAnalyticsRepository {
    pool: Pool<Postgres>,
}

impl PgAnalyticsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Sparse per-day entry counts, ascending.
    async fn daily_entry_counts(&self, scope: UserScope, window: &AnalyticsWindow) -> Result<Vec<DailyCount>> {
        let filter = entry_filter(scope, window);
        let sql = format!(
            "SELECT (e.created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS count
             FROM entry e
             WHERE {}
             GROUP BY day
             ORDER BY day",
            filter.where_clause()
        );
        let rows = bind_params(sqlx::query(&sql), filter.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows
            .iter()
            .map(|r| DailyCount {
                date: r.get("day"),
                count: r.get("count"),
            })
            .collect())
    }

    /// Entry counts per category label; uncategorized entries are left out.
    async fn category_label_counts(&self, scope: UserScope, window: &AnalyticsWindow) -> Result<Vec<(String, i64)>> {
        let filter = entry_filter(scope, window);
        let sql = format!(
            "SELECT c.name, COUNT(*) AS count
             FROM entry e
             JOIN category c ON c.id = e.category_id
             WHERE {}
             GROUP BY c.name
             ORDER BY count DESC, c.name",
            filter.where_clause()
        );
        let rows = bind_params(sqlx::query(&sql), filter.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(|r| (r.get("name"), r.get("count"))).collect())
    }

    /// Entry counts per tag name, ascending by name.
    async fn tag_counts(&self, scope: UserScope, window: &AnalyticsWindow) -> Result<Vec<(String, i64)>> {
        let filter = entry_filter(scope, window);
        let sql = format!(
            "SELECT t.name, COUNT(*) AS count
             FROM entry_tag et
             JOIN entry e ON e.id = et.entry_id
             JOIN tag t ON t.id = et.tag_id
             WHERE {}
             GROUP BY t.name
             ORDER BY t.name",
            filter.where_clause()
        );
        let rows = bind_params(sqlx::query(&sql), filter.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(|r| (r.get("name"), r.get("count"))).collect())
    }
}

#[async_trait]
impl AnalyticsRepository for PgAnalyticsRepository {
    async fn metric_summary(&self, scope: UserScope, filter: MetricFilter) -> Result<Vec<MetricSummary>> {
        let builder = metric_filter(scope, &filter);
        let sql = format!(
            "SELECT c.name AS category_name, m.metric_name,
                    AVG(m.value)::float8 AS avg_value,
                    MIN(m.value)::float8 AS min_value,
                    MAX(m.value)::float8 AS max_value,
                    COUNT(*) AS total_records
             FROM metric m
             JOIN entry e ON e.id = m.entry_id
             LEFT JOIN category c ON c.id = m.category_id
             WHERE {}
             GROUP BY c.name, m.metric_name
             ORDER BY c.name NULLS LAST, m.metric_name",
            builder.where_clause()
        );
        let rows = bind_params(sqlx::query(&sql), builder.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows
            .iter()
            .map(|r| MetricSummary {
                category: r.get("category_name"),
                metric_name: r.get("metric_name"),
                avg_value: r.get("avg_value"),
                min_value: r.get("min_value"),
                max_value: r.get("max_value"),
                total_records: r.get("total_records"),
            })
            .collect())
    }

    async fn metric_trend(&self, scope: UserScope, filter: MetricFilter) -> Result<Vec<TrendPoint>> {
        let builder = metric_filter(scope, &filter);
        let sql = format!(
            "SELECT (m.created_at AT TIME ZONE 'UTC')::date AS day,
                    AVG(m.value)::float8 AS avg_value,
                    COUNT(*) AS count
             FROM metric m
             JOIN entry e ON e.id = m.entry_id
             LEFT JOIN category c ON c.id = m.category_id
             WHERE {}
             GROUP BY day
             ORDER BY day",
            builder.where_clause()
        );
        let rows = bind_params(sqlx::query(&sql), builder.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows
            .iter()
            .map(|r| TrendPoint {
                date: r.get("day"),
                avg_value: r.get("avg_value"),
                count: r.get("count"),
            })
            .collect())
    }

    async fn entry_counts(&self, scope: UserScope, window: AnalyticsWindow) -> Result<Vec<CategoryEntryCount>> {
        let filter = entry_filter(scope, &window);
        let sql = format!(
            "SELECT e.category_id, c.name AS category_name, COUNT(*) AS count
             FROM entry e
             LEFT JOIN category c ON c.id = e.category_id
             WHERE {}
             GROUP BY e.category_id, c.name
             ORDER BY count DESC, c.name NULLS LAST",
            filter.where_clause()
        );
        let rows = bind_params(sqlx::query(&sql), filter.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows
            .iter()
            .map(|r| CategoryEntryCount {
                category_id: r.get("category_id"),
                category: r.get("category_name"),
                count: r.get("count"),
            })
            .collect())
    }

    async fn dashboard(&self, scope: UserScope) -> Result<Dashboard> {
        let user_id = scope.user_id();
        let totals = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM entry WHERE user_id = $1) AS total_entries,
                (SELECT COUNT(*) FROM category WHERE user_id = $1) AS total_categories,
                (SELECT COUNT(DISTINCT et.tag_id)
                   FROM entry_tag et JOIN entry e ON e.id = et.entry_id
                  WHERE e.user_id = $1) AS total_tags",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let recent = sqlx::query(
            "SELECT id, title, content, created_at FROM entry
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(DASHBOARD_RECENT_ENTRIES)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let by_category = self
            .category_label_counts(scope, &AnalyticsWindow::unbounded())
            .await?;
        let by_date = self
            .daily_entry_counts(scope, &AnalyticsWindow::last_days(DASHBOARD_DAYS)?)
            .await?;

        Ok(Dashboard {
            total_entries: totals.get("total_entries"),
            total_categories: totals.get("total_categories"),
            total_tags: totals.get("total_tags"),
            recent_entries: recent
                .iter()
                .map(|r| RecentEntry {
                    id: r.get("id"),
                    title: r.get("title"),
                    content: r.get("content"),
                    created_at: r.get("created_at"),
                })
                .collect(),
            entries_by_category: by_category
                .into_iter()
                .map(|(category, count)| LabelCount { category, count })
                .collect(),
            entries_by_date: by_date,
        })
    }

    async fn report(&self, scope: UserScope, range: NamedRange) -> Result<AnalyticsReport> {
        let started = Instant::now();
        let now = Utc::now();
        let window = range.window_at(now);

        let filter = entry_filter(scope, &window);
        let sql = format!(
            "SELECT COUNT(*) AS total_entries,
                    COUNT(DISTINCT e.category_id) AS total_categories,
                    MIN(e.created_at) AS first_entry
             FROM entry e
             WHERE {}",
            filter.where_clause()
        );
        let totals = bind_params(sqlx::query(&sql), filter.params())
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        let total_entries: i64 = totals.get("total_entries");
        let total_categories: i64 = totals.get("total_categories");
        let first_entry: Option<DateTime<Utc>> = totals.get("first_entry");

        let by_category = self.category_label_counts(scope, &window).await?;
        let by_tag = self.tag_counts(scope, &window).await?;
        let sparse = self.daily_entry_counts(scope, &window).await?;

        let days = match (window.start, first_entry) {
            (Some(start), _) => days_in_range(start, now),
            (None, Some(first)) => days_in_range(first, now),
            (None, None) => 1,
        };
        let first_day: Option<NaiveDate> = sparse.first().map(|d| d.date);
        let span = window.span_dates(first_day, now.date_naive(), REPORT_SERIES_MAX_DAYS);
        let entries_by_date = match span {
            Some((start, end)) => fill_daily_counts(&sparse, start, end),
            None => Vec::new(),
        };

        let report = AnalyticsReport {
            time_range: range.as_str().to_string(),
            total_entries,
            total_categories,
            total_tags: by_tag.len() as i64,
            average_entries_per_day: average_per_day(total_entries, days),
            most_active_day: most_active_day(&sparse),
            most_used_category: most_used(&by_category),
            most_used_tag: most_used(&by_tag),
            entries_by_category: category_shares(by_category),
            entries_by_date,
            entries_by_tag: by_tag
                .into_iter()
                .map(|(tag, count)| TagCount { tag, count })
                .collect(),
        };

        info!(
            subsystem = "db",
            component = "analytics",
            op = "report",
            user_id = %scope,
            window = range.as_str(),
            result_count = report.total_entries,
            duration_ms = started.elapsed().as_millis() as u64,
            "Analytics report built"
        );
        Ok(report)
    }

    async fn metrics_by_category(&self, scope: UserScope, filter: MetricFilter) -> Result<MetricsByCategory> {
        let builder = metric_filter(scope, &filter);
        let sql = format!(
            "SELECT c.name AS category_name,
                    COUNT(*) AS count,
                    COALESCE(SUM(m.value), 0)::float8 AS total
             FROM metric m
             JOIN entry e ON e.id = m.entry_id
             LEFT JOIN category c ON c.id = m.category_id
             WHERE {}
             GROUP BY c.name",
            builder.where_clause()
        );
        let rows = bind_params(sqlx::query(&sql), builder.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        let groups = rows
            .iter()
            .map(|r| MetricGroup {
                category: r.get("category_name"),
                count: r.get("count"),
                total: r.get("total"),
            })
            .collect();
        Ok(metric_category_shares(groups))
    }

    async fn metrics_by_value(
        &self,
        scope: UserScope,
        filter: MetricFilter,
        limit: i64,
    ) -> Result<Vec<RankedMetric>> {
        if !(1..=TOP_METRICS_LIMIT_MAX).contains(&limit) {
            return Err(Error::InvalidInput(format!(
                "limit must be between 1 and {}",
                TOP_METRICS_LIMIT_MAX
            )));
        }
        let mut builder = metric_filter(scope, &filter);
        let tail = builder.limit_offset(limit, 0);
        let sql = format!(
            "SELECT m.id, m.entry_id, e.title AS entry_title, c.name AS category_name,
                    m.metric_name, m.value::float8 AS value, m.unit, m.created_at
             FROM metric m
             JOIN entry e ON e.id = m.entry_id
             LEFT JOIN category c ON c.id = m.category_id
             WHERE {}
             ORDER BY m.value DESC, m.created_at DESC, m.id {}",
            builder.where_clause(),
            tail
        );
        let rows = bind_params(sqlx::query(&sql), builder.params())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "analytics",
            op = "metrics_by_value",
            user_id = %scope,
            result_count = rows.len(),
            "Ranked metrics loaded"
        );
        Ok(rows
            .iter()
            .map(|r| RankedMetric {
                id: r.get("id"),
                entry_id: r.get("entry_id"),
                entry_title: r.get("entry_title"),
                category: r.get("category_name"),
                metric_name: r.get("metric_name"),
                value: r.get("value"),
                unit: r.get("unit"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn scope() -> UserScope {
        UserScope::new(Uuid::nil())
    }

    #[test]
    fn test_unbounded_entry_filter_is_owner_only() {
        let f = entry_filter(scope(), &AnalyticsWindow::unbounded());
        assert_eq!(f.where_clause(), "e.user_id = $1");
    }

    #[test]
    fn test_entry_filter_applies_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let window = AnalyticsWindow::between(Some(now - Duration::days(7)), Some(now)).unwrap();
        let f = entry_filter(scope(), &window);
        assert_eq!(
            f.where_clause(),
            "e.user_id = $1 AND e.created_at >= $2 AND e.created_at <= $3"
        );
    }

    #[test]
    fn test_metric_filter_orders_placeholders() {
        let filter = MetricFilter {
            category: Some("health".into()),
            metric_name: Some("steps".into()),
            window: AnalyticsWindow::unbounded(),
        };
        let f = metric_filter(scope(), &filter);
        assert_eq!(
            f.where_clause(),
            "e.user_id = $1 AND c.name = $2 AND m.metric_name = $3"
        );
        assert_eq!(f.params().len(), 3);
    }
}
