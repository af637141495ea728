use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use secrecy::ExposeSecret;
use tower_sessions::Session;

use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::models::auth::{LoginForm, RegisterForm};
use crate::services::api_client::ApiError;
use crate::services::token_store::TokenStore;

/// Delay before the register view hands over to the login view
pub const REGISTER_REDIRECT_SECS: u32 = 2;

const CONNECTION_ERROR: &str = "Connection error. Please try again.";

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    username: String,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    error: Option<String>,
    success: Option<String>,
    redirect_after_secs: Option<u32>,
}

/// Shows the login form, or goes straight to the dashboard when a token is
/// already stored.
async fn login_page(session: Session) -> Result<Response, AppError> {
    let tokens = TokenStore::new(session);
    if tokens.access_token().await?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    Ok(LoginTemplate {
        username: String::new(),
        error: None,
    }
    .into_response())
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let token = match state.api.login(&form.username, &form.password).await {
        Ok(token) => token,
        Err(e) => {
            let message = match e {
                ApiError::HttpError(_) => CONNECTION_ERROR,
                ApiError::Unauthorized | ApiError::Status { .. } | ApiError::NotFound => {
                    "Invalid username or password"
                }
                _ => "Login failed. Please try again.",
            };
            tracing::warn!(username = %form.username, error = %e, "Login rejected");

            return Ok(LoginTemplate {
                username: form.username,
                error: Some(message.to_string()),
            }
            .into_response());
        }
    };

    let tokens = TokenStore::new(session);
    tokens
        .save(
            token.access_token.expose_secret().clone(),
            token.full_name,
            token.role,
        )
        .await?;

    tracing::info!(username = %form.username, "User logged in");

    Ok(Redirect::to("/").into_response())
}

async fn register_page() -> RegisterTemplate {
    RegisterTemplate {
        error: None,
        success: None,
        redirect_after_secs: None,
    }
}

async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> RegisterTemplate {
    match state.api.register(&form).await {
        Ok(()) => RegisterTemplate {
            error: None,
            success: Some("Registration successful. You can sign in now.".to_string()),
            redirect_after_secs: Some(REGISTER_REDIRECT_SECS),
        },
        Err(e) => {
            tracing::warn!(username = %form.username, error = %e, "Registration failed");
            let message = match e {
                ApiError::HttpError(_) => CONNECTION_ERROR.to_string(),
                ApiError::Status { message, .. } if !message.trim().is_empty() => message,
                _ => "Registration failed. Please try again.".to_string(),
            };
            RegisterTemplate {
                error: Some(message),
                success: None,
                redirect_after_secs: None,
            }
        }
    }
}

/// Clears the stored token and user info
async fn logout(session: Session) -> Result<Redirect, AppError> {
    TokenStore::new(session).clear().await?;

    tracing::info!("User logged out");

    Ok(Redirect::to("/login"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", get(logout))
}
