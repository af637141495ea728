// API module - HTTP endpoints

pub mod auth;
pub mod dashboard;
pub mod downloads;
pub mod middleware;

use axum::{
    routing::{get, get_service},
    Router,
};
use std::path::Path;
use tower_http::{services::ServeDir, trace::TraceLayer};

use middleware::session::{create_session_layer, AppState};

/// Builds the console router with sessions, tracing and static assets.
pub fn router(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config.secure_cookies);

    // Serve static assets from web/static
    let static_routes = Router::new().nest_service(
        "/static",
        get_service(ServeDir::new(Path::new("web").join("static"))),
    );

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(downloads::router())
        .merge(static_routes)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
