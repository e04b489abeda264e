//! Entry HTTP handlers.
//!
//! Entry writes carry their tags and metrics inline; the database layer
//! reconciles both in the same transaction as the entry row.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use memo_core::{
    CreateEntryRequest, Entry, EntryRepository, EntryStatus, ListEntriesRequest, MetricSpec,
    Priority, TagRepository, UpdateEntryRequest,
};

use crate::query_types::{parse_flexible_datetime, PageQuery};
use crate::{ApiError, AppState, CurrentUser};

/// Query parameters for listing entries.
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub category_id: Option<Uuid>,
    pub status: Option<EntryStatus>,
    pub priority: Option<Priority>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Request body for creating an entry.
#[derive(Debug, Deserialize)]
pub struct CreateEntryBody {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
    /// Backdated creation time as text.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

/// Request body for a partial entry update.
#[derive(Debug, Deserialize)]
pub struct UpdateEntryBody {
    #[serde(flatten)]
    pub fields: UpdateEntryRequest,
    /// Backdated creation time as text.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<UpdateEntryBody> for UpdateEntryRequest {
    fn from(body: UpdateEntryBody) -> Self {
        UpdateEntryRequest {
            created_at: backdate(body.created_at.as_deref()),
            ..body.fields
        }
    }
}

/// Resolve a backdated timestamp. Unparsable input is logged and replaced
/// with the current time rather than failing the write.
fn backdate(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match parse_flexible_datetime(raw) {
        Ok(dt) => Some(dt.into_inner()),
        Err(e) => {
            warn!(
                subsystem = "api",
                component = "entries",
                created_at = raw,
                error = %e,
                "Unparsable created_at, using current time"
            );
            None
        }
    }
}

impl From<CreateEntryBody> for CreateEntryRequest {
    fn from(body: CreateEntryBody) -> Self {
        CreateEntryRequest {
            created_at: backdate(body.created_at.as_deref()),
            title: body.title,
            content: body.content,
            category_id: body.category_id,
            priority: body.priority.unwrap_or_default(),
            status: body.status.unwrap_or_default(),
            tags: body.tags,
            metrics: body.metrics,
        }
    }
}

/// List the caller's entries, newest first.
///
/// # Query Parameters
/// - `category_id`, `status`, `priority`: optional exact filters
/// - `skip`, `limit`: pagination
///
/// # Returns
/// - 200 OK with entries including tags and metrics
/// - 400 Bad Request on invalid pagination
pub async fn list_entries(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    let page = PageQuery {
        skip: query.skip,
        limit: query.limit,
    }
    .page()?;
    let req = ListEntriesRequest {
        category_id: query.category_id,
        status: query.status,
        priority: query.priority,
        page,
    };
    Ok(Json(state.db.entries.list(user.scope, req).await?))
}

/// Create an entry with its tags and metrics.
///
/// # Returns
/// - 201 Created with the entry
/// - 400 Bad Request on an empty title or an out-of-range metric value
/// - 404 Not Found if `category_id` is not one of the caller's categories
pub async fn create_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateEntryBody>,
) -> Result<(StatusCode, Json<Entry>), ApiError> {
    let entry = state.db.entries.create(user.scope, body.into()).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Get one entry.
///
/// # Returns
/// - 200 OK with the entry
/// - 404 Not Found if missing or owned by another user
pub async fn get_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Entry>, ApiError> {
    Ok(Json(state.db.entries.get(user.scope, id).await?))
}

/// Partially update an entry.
///
/// Omitted fields are left alone. `tags` and `metrics`, when present,
/// replace the current sets (`[]` clears). `created_at` accepts the same
/// shapes as on create; unparsable values leave the timestamp unchanged.
///
/// # Returns
/// - 200 OK with the updated entry
/// - 400 Bad Request on invalid input
/// - 404 Not Found if missing or owned by another user
pub async fn update_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEntryBody>,
) -> Result<Json<Entry>, ApiError> {
    Ok(Json(state.db.entries.update(user.scope, id, body.into()).await?))
}

/// Delete an entry, its metrics and its tag associations.
///
/// # Returns
/// - 204 No Content on success
/// - 404 Not Found if missing or owned by another user
pub async fn delete_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.entries.delete(user.scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach an existing tag to an entry.
///
/// # Returns
/// - 204 No Content on success (also when already attached)
/// - 404 Not Found if the entry or tag does not exist
pub async fn attach_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((entry_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state.db.tags.attach(user.scope, entry_id, tag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Detach a tag from an entry.
///
/// # Returns
/// - 204 No Content on success
/// - 404 Not Found if the entry is missing or the tag is not attached
pub async fn detach_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((entry_id, tag_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state.db.tags.detach(user.scope, entry_id, tag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_defaults() {
        let body: CreateEntryBody = serde_json::from_str(r#"{"title":"Run log"}"#).unwrap();
        let req = CreateEntryRequest::from(body);
        assert_eq!(req.title, "Run log");
        assert_eq!(req.priority, Priority::default());
        assert_eq!(req.status, EntryStatus::default());
        assert!(req.created_at.is_none());
        assert!(req.tags.is_empty());
    }

    #[test]
    fn test_backdate_parses_and_recovers() {
        let parsed = backdate(Some("2024-01-15T10:30:00Z")).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T10:30:00+00:00");
        assert!(backdate(Some("not a date")).is_none());
        assert!(backdate(Some("   ")).is_none());
        assert!(backdate(None).is_none());
    }

    #[test]
    fn test_backdate_out_of_range_is_ignored() {
        assert!(backdate(Some("99999999999d")).is_none());
        assert!(backdate(Some("9223372036854775807h")).is_none());
    }

    #[test]
    fn test_update_body_backdates_and_keeps_fields() {
        let body: UpdateEntryBody = serde_json::from_str(
            r#"{"title":"Moved","category_id":null,"created_at":"2024-01-15","tags":[]}"#,
        )
        .unwrap();
        let req = UpdateEntryRequest::from(body);
        assert_eq!(req.title.as_deref(), Some("Moved"));
        assert_eq!(req.category_id, Some(None));
        assert_eq!(req.tags, Some(vec![]));
        assert!(req.metrics.is_none());
        assert_eq!(
            req.created_at.map(|dt| dt.to_rfc3339()).as_deref(),
            Some("2024-01-15T00:00:00+00:00")
        );

        let body: UpdateEntryBody =
            serde_json::from_str(r#"{"created_at":"someday"}"#).unwrap();
        let req = UpdateEntryRequest::from(body);
        assert!(req.created_at.is_none());
        assert!(req.category_id.is_none());
    }

    #[test]
    fn test_body_carries_metrics() {
        let body: CreateEntryBody = serde_json::from_str(
            r#"{"title":"Run","tags":["fitness"],
                "metrics":[{"category":"health","metric_name":"distance_km","value":5.0}]}"#,
        )
        .unwrap();
        let req = CreateEntryRequest::from(body);
        assert_eq!(req.tags, vec!["fitness"]);
        assert_eq!(req.metrics[0].value, Some(5.0));
    }
}
