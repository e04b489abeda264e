//! Registration, login and logout.
//!
//! Tokens are opaque bearer strings; only their SHA-256 digest is stored.
//! Login accepts either a JSON body or an HTML form body, chosen by the
//! request's `Content-Type`.

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use memo_core::{IssuedToken, RegisterUserRequest, TokenRepository, User, UserRepository};

use crate::{ApiError, AppState, CurrentUser};

/// Login credentials. Either `email` or `username` identifies the account;
/// both are matched against email and username.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

impl LoginRequest {
    fn login(&self) -> Option<&str> {
        [self.email.as_deref(), self.username.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Token plus the account it belongs to.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: User,
}

async fn issue_for(state: &AppState, user: User) -> Result<AuthResponse, ApiError> {
    let token = state
        .db
        .tokens
        .issue(user.id, state.token_lifetime_minutes)
        .await?;
    Ok(AuthResponse { token, user })
}

/// Register a new account and sign it in.
///
/// # Returns
/// - 201 Created with token and user
/// - 400 Bad Request on invalid email, username or password
/// - 409 Conflict if the email or username is taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let user = state.db.users.register(req).await?;
    info!(subsystem = "api", component = "auth", user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(issue_for(&state, user).await?)))
}

/// Exchange credentials for a bearer token.
///
/// # Request Body
/// JSON `{"email"|"username", "password"}` or form `username=..&password=..`
///
/// # Returns
/// - 200 OK with token and user
/// - 400 Bad Request if the body is malformed or the account is not active
/// - 401 Unauthorized on bad credentials
pub async fn login(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<AuthResponse>, ApiError> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let req = if is_form {
        let Form(req) = Form::<LoginRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        req
    } else {
        let Json(req) = Json::<LoginRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        req
    };

    let login = req
        .login()
        .ok_or_else(|| ApiError::BadRequest("email or username is required".to_string()))?;
    let user = state.db.users.verify_credentials(login, &req.password).await?;
    info!(subsystem = "api", component = "auth", user_id = %user.id, "User logged in");
    Ok(Json(issue_for(&state, user).await?))
}

/// Revoke the presented token.
///
/// # Returns
/// - 204 No Content on success
/// - 401 Unauthorized without a valid token
pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<StatusCode, ApiError> {
    state.db.tokens.revoke(&user.token).await?;
    info!(subsystem = "api", component = "auth", user_id = %user.scope, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_prefers_email_and_trims() {
        let req = LoginRequest {
            username: Some("alice".to_string()),
            email: Some("  alice@example.test ".to_string()),
            password: "pw".to_string(),
        };
        assert_eq!(req.login(), Some("alice@example.test"));

        let req = LoginRequest {
            username: Some("alice".to_string()),
            email: None,
            password: "pw".to_string(),
        };
        assert_eq!(req.login(), Some("alice"));
    }

    #[test]
    fn test_login_requires_identifier() {
        let req: LoginRequest = serde_json::from_str(r#"{"password":"pw"}"#).unwrap();
        assert_eq!(req.login(), None);
        let req: LoginRequest =
            serde_json::from_str(r#"{"username":"  ","password":"pw"}"#).unwrap();
        assert_eq!(req.login(), None);
    }
}
