//! Tag HTTP handlers.
//!
//! Tags are one shared namespace, but every read and write here only sees
//! tags attached to the caller's own entries.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use memo_core::{Tag, TagNameRequest, TagRepository};

use crate::query_types::PageQuery;
use crate::{ApiError, AppState, CurrentUser};

/// List tags used on the caller's entries.
///
/// # Returns
/// - 200 OK with tags ordered by name
/// - 400 Bad Request on invalid pagination
pub async fn list_tags(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Tag>>, ApiError> {
    let page = query.page()?;
    Ok(Json(state.db.tags.list(user.scope, page).await?))
}

/// Find or create a tag by name.
///
/// The tag only shows up in the caller's listings once it is attached to
/// one of their entries.
///
/// # Returns
/// - 201 Created with the tag
/// - 400 Bad Request on an empty or overlong name
pub async fn create_tag(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(req): Json<TagNameRequest>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let tag = state.db.tags.find_or_create(&req.name).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// Get one tag.
///
/// # Returns
/// - 200 OK with the tag
/// - 404 Not Found unless attached to one of the caller's entries
pub async fn get_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.db.tags.get(user.scope, id).await?))
}

/// Rename a tag for the caller.
///
/// Other users' entries keep the old name; the caller's associations move
/// to the tag carrying the new name.
///
/// # Returns
/// - 200 OK with the tag now attached
/// - 400 Bad Request on an invalid name
/// - 404 Not Found unless attached to one of the caller's entries
pub async fn rename_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TagNameRequest>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.db.tags.rename(user.scope, id, &req.name).await?))
}

/// Remove a tag from all of the caller's entries.
///
/// # Returns
/// - 204 No Content on success
/// - 404 Not Found unless attached to one of the caller's entries
pub async fn delete_tag(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.tags.delete(user.scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
