//! Category HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use memo_core::{Category, CategoryRepository, CreateCategoryRequest, UpdateCategoryRequest};

use crate::query_types::PageQuery;
use crate::{ApiError, AppState, CurrentUser};

/// List the caller's categories.
///
/// # Returns
/// - 200 OK with categories ordered by name
/// - 400 Bad Request on invalid pagination
pub async fn list_categories(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let page = query.page()?;
    Ok(Json(state.db.categories.list(user.scope, page).await?))
}

/// Create a category.
///
/// # Returns
/// - 201 Created with the category
/// - 400 Bad Request on an empty or overlong name
/// - 404 Not Found if `parent_category_id` is not the caller's
/// - 409 Conflict if the caller already has a category with this name
pub async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.db.categories.create(user.scope, req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Get one category.
///
/// # Returns
/// - 200 OK with the category
/// - 404 Not Found if missing or owned by another user
pub async fn get_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.db.categories.get(user.scope, id).await?))
}

/// Partially update a category.
///
/// # Returns
/// - 200 OK with the updated category
/// - 400 Bad Request on invalid input or a self-parent
/// - 404 Not Found if missing or owned by another user
/// - 409 Conflict on a duplicate name
pub async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.db.categories.update(user.scope, id, req).await?))
}

/// Delete a category. Entries, metrics and child categories that pointed
/// at it become uncategorized.
///
/// # Returns
/// - 204 No Content on success
/// - 404 Not Found if missing or owned by another user
pub async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.categories.delete(user.scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
