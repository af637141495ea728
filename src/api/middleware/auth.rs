use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::services::token_store::{KeyValueStore, SessionUser, StoreError, TokenStore};

pub const LOGIN_PATH: &str = "/login";

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    SessionError(StoreError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthorized => Redirect::to(LOGIN_PATH).into_response(),
            AuthError::SessionError(e) => {
                tracing::error!(error = %e, "Session error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error occurred.").into_response()
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::SessionError(e)
    }
}

/// Returns the logged-in user, or `Unauthorized` when no token is stored.
pub async fn check_auth<S: KeyValueStore>(
    tokens: &TokenStore<S>,
) -> Result<SessionUser, AuthError> {
    tokens.current_user().await?.ok_or(AuthError::Unauthorized)
}

/// Drops the stored session after the backend rejected its token and sends
/// the user back to the login view.
pub async fn expire_session<S: KeyValueStore>(tokens: &TokenStore<S>) -> Response {
    tracing::info!("Clearing rejected session");
    match tokens.clear().await {
        Ok(()) => AuthError::Unauthorized.into_response(),
        Err(e) => AuthError::SessionError(e).into_response(),
    }
}
