//! Bearer token extractor.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use tracing::debug;

use memo_core::{TokenRepository, UserScope};

use crate::{ApiError, AppState};

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
///
/// Handlers that take this extractor reject the request with 401 before
/// running when the header is missing, malformed, expired or revoked.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub scope: UserScope,
    /// The presented token, kept so logout can revoke it.
    pub token: String,
}

/// Pull the token out of an `Authorization` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?
            .to_string();

        match state.db.tokens.validate(&token).await? {
            Some(scope) => Ok(CurrentUser { scope, token }),
            None => {
                debug!(subsystem = "api", component = "auth", "Rejected invalid or expired token");
                Err(ApiError::Unauthorized(
                    "Could not validate credentials".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer memo_at_abc"), Some("memo_at_abc"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("bearer memo_at_abc"), None);
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
    }
}
