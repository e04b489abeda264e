//! Metric HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use memo_core::{
    CreateMetricRequest, ListMetricsRequest, Metric, MetricRepository, UpdateMetricRequest,
};

use crate::query_types::PageQuery;
use crate::{ApiError, AppState, CurrentUser};

/// Query parameters for listing metrics.
#[derive(Debug, Deserialize)]
pub struct ListMetricsQuery {
    pub entry_id: Option<Uuid>,
    /// Exact category label.
    pub category: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// List metrics on the caller's entries, newest first.
///
/// # Returns
/// - 200 OK with metrics
/// - 400 Bad Request on invalid pagination
pub async fn list_metrics(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListMetricsQuery>,
) -> Result<Json<Vec<Metric>>, ApiError> {
    let page = PageQuery {
        skip: query.skip,
        limit: query.limit,
    }
    .page()?;
    let req = ListMetricsRequest {
        entry_id: query.entry_id,
        category: query.category.filter(|c| !c.trim().is_empty()),
        page,
    };
    Ok(Json(state.db.metrics.list(user.scope, req).await?))
}

/// Record a metric on one of the caller's entries.
///
/// The value is rounded to two decimals; `category` is a label resolved to
/// (or created as) one of the caller's categories.
///
/// # Returns
/// - 201 Created with the metric
/// - 400 Bad Request on an empty name or out-of-range value
/// - 404 Not Found if the entry is not the caller's
pub async fn create_metric(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateMetricRequest>,
) -> Result<(StatusCode, Json<Metric>), ApiError> {
    let metric = state.db.metrics.create(user.scope, req).await?;
    Ok((StatusCode::CREATED, Json(metric)))
}

/// Get one metric.
///
/// # Returns
/// - 200 OK with the metric
/// - 404 Not Found if missing or on another user's entry
pub async fn get_metric(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Metric>, ApiError> {
    Ok(Json(state.db.metrics.get(user.scope, id).await?))
}

/// Partially update a metric.
///
/// # Returns
/// - 200 OK with the updated metric
/// - 400 Bad Request on invalid input
/// - 404 Not Found if missing or on another user's entry
pub async fn update_metric(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMetricRequest>,
) -> Result<Json<Metric>, ApiError> {
    Ok(Json(state.db.metrics.update(user.scope, id, req).await?))
}

/// Delete a metric.
///
/// # Returns
/// - 204 No Content on success
/// - 404 Not Found if missing or on another user's entry
pub async fn delete_metric(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.metrics.delete(user.scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
