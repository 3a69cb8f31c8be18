use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderName;

use crate::http::AppError;
use crate::AppState;

/// Caller allowed to announce identity transitions. Open when no
/// `SESSION_HOOK_TOKEN` is configured.
#[derive(Debug, Clone)]
pub struct SessionHook;

const SESSION_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-session-token");

#[axum::async_trait]
impl FromRequestParts<AppState> for SessionHook {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.session_hook_token.as_ref() else {
            return Ok(SessionHook);
        };

        let provided = parts
            .headers
            .get(SESSION_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::forbidden("missing session token"))?;

        if provided != expected {
            return Err(AppError::forbidden("invalid session token"));
        }

        Ok(SessionHook)
    }
}
