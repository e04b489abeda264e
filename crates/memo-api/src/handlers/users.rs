//! Account handlers for the authenticated caller.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use memo_core::{User, UserRepository};

use crate::{ApiError, AppState, CurrentUser};

/// Get the caller's account.
///
/// # Returns
/// - 200 OK with the user
/// - 401 Unauthorized without a valid token
pub async fn get_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.db.users.get(user.scope).await?))
}

/// Delete the caller's account together with every entry, category,
/// metric and token it owns.
///
/// # Returns
/// - 204 No Content on success
/// - 401 Unauthorized without a valid token
pub async fn delete_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.db.users.delete(user.scope).await?;
    info!(subsystem = "api", component = "users", user_id = %user.scope, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}
