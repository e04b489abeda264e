//! Analytics HTTP handlers.
//!
//! Every view is read-only and scoped to the caller. Windows come either
//! from `start_date`/`end_date`, from `days=N`, or (for `/analytics`) from a
//! named `time_range`.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;

use memo_core::defaults::{ANALYTICS_DAYS, ANALYTICS_TIME_RANGE, TOP_METRICS_LIMIT};
use memo_core::{
    AnalyticsReport, AnalyticsRepository, AnalyticsWindow, CategoryEntryCount, Dashboard,
    MetricFilter, MetricSummary, MetricsByCategory, NamedRange, RankedMetric, TrendPoint,
};

use crate::query_types::{DateRangeQuery, FlexibleDateTime};
use crate::{ApiError, AppState, CurrentUser};

/// Query parameters shared by the metric and count views.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    /// Exact category label.
    pub category: Option<String>,
    pub metric_name: Option<String>,
    pub start_date: Option<FlexibleDateTime>,
    pub end_date: Option<FlexibleDateTime>,
    /// Trailing window length, used when no explicit dates are given.
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

impl AnalyticsQuery {
    fn dates(&self) -> DateRangeQuery {
        DateRangeQuery {
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    /// Explicit dates, unbounded when none are given.
    fn explicit_window(&self) -> Result<AnalyticsWindow, ApiError> {
        self.dates().window()
    }

    /// Explicit dates if any, else the trailing `days` (default 30).
    fn trailing_window(&self) -> Result<AnalyticsWindow, ApiError> {
        let dates = self.dates();
        if !dates.is_empty() {
            return dates.window();
        }
        Ok(AnalyticsWindow::last_days(self.days.unwrap_or(ANALYTICS_DAYS))?)
    }

    fn filter(&self, window: AnalyticsWindow) -> MetricFilter {
        let non_blank = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        MetricFilter {
            category: non_blank(&self.category),
            metric_name: non_blank(&self.metric_name),
            window,
        }
    }
}

/// Query parameters for the comprehensive report.
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// `7d`, `30d`, `90d` or `all`; unknown values mean `all`.
    pub time_range: Option<String>,
}

/// Comprehensive analytics for a named time range.
///
/// # Query Parameters
/// - `time_range`: `7d`, `30d` (default), `90d` or `all`
///
/// # Returns
/// - 200 OK with totals, most-active/most-used labels and distributions
pub async fn report(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let range = NamedRange::parse_lenient(
        query.time_range.as_deref().unwrap_or(ANALYTICS_TIME_RANGE),
    );
    debug!(subsystem = "api", component = "analytics", time_range = range.as_str(), "Report requested");
    Ok(Json(state.db.analytics.report(user.scope, range).await?))
}

/// Overview of the caller's data.
///
/// # Returns
/// - 200 OK with totals, the 5 most recent entries, entries per category
///   and a 30-day sparse daily series
pub async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.db.analytics.dashboard(user.scope).await?))
}

/// Avg/min/max/count per category label and metric name.
///
/// # Query Parameters
/// - `category`, `metric_name`: optional exact filters
/// - `start_date`, `end_date`: optional window bounds
///
/// # Returns
/// - 200 OK with one row per group that has data
/// - 400 Bad Request on invalid dates
pub async fn metric_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<MetricSummary>>, ApiError> {
    let filter = query.filter(query.explicit_window()?);
    Ok(Json(state.db.analytics.metric_summary(user.scope, filter).await?))
}

/// Per-day average metric value.
///
/// Days without data are absent from the result.
///
/// # Query Parameters
/// - `metric_name`, `category`: optional exact filters
/// - `start_date`, `end_date`: explicit window, or
/// - `days`: trailing window length (default 30)
///
/// # Returns
/// - 200 OK with points ascending by date
/// - 400 Bad Request on invalid dates or `days < 1`
pub async fn metric_trend(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let filter = query.filter(query.trailing_window()?);
    Ok(Json(state.db.analytics.metric_trend(user.scope, filter).await?))
}

/// Entry counts per category.
///
/// # Query Parameters
/// - `start_date`, `end_date`: explicit window, or
/// - `days`: trailing window length (default 30)
///
/// # Returns
/// - 200 OK with counts; uncategorized entries have a null category
/// - 400 Bad Request on invalid dates or `days < 1`
pub async fn entry_counts(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<CategoryEntryCount>>, ApiError> {
    let window = query.trailing_window()?;
    Ok(Json(state.db.analytics.entry_counts(user.scope, window).await?))
}

/// Metric count, average, total and share per category label.
///
/// # Returns
/// - 200 OK with `totalMetrics` and categories sorted by percentage
/// - 400 Bad Request on invalid dates
pub async fn metrics_by_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<MetricsByCategory>, ApiError> {
    let filter = query.filter(query.explicit_window()?);
    Ok(Json(
        state.db.analytics.metrics_by_category(user.scope, filter).await?,
    ))
}

/// The caller's highest metric values.
///
/// # Query Parameters
/// - `metric_name`, `category`: optional exact filters
/// - `start_date`, `end_date`: optional window bounds
/// - `limit`: 1..=100, default 10
///
/// # Returns
/// - 200 OK with metrics ranked by value descending
/// - 400 Bad Request on invalid dates or limit
pub async fn metrics_by_value(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<RankedMetric>>, ApiError> {
    let filter = query.filter(query.explicit_window()?);
    let limit = query.limit.unwrap_or(TOP_METRICS_LIMIT);
    Ok(Json(
        state
            .db
            .analytics
            .metrics_by_value(user.scope, filter, limit)
            .await?,
    ))
}
