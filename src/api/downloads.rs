use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tower_sessions::Session;

use crate::api::middleware::auth::check_auth;
use crate::api::middleware::session::{load_manifest, set_flash, AppState, Flash};
use crate::error::AppError;
use crate::services::downloads::BUNDLE_FILENAME;
use crate::services::token_store::TokenStore;

fn attachment(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// Serves one PNG of the latest issuance batch
async fn download_one(Path(index): Path<usize>, session: Session) -> Result<Response, AppError> {
    if let Err(e) = check_auth(&TokenStore::new(session.clone())).await {
        return Ok(e.into_response());
    }

    let manifest = load_manifest(&session).await?;
    let entry = manifest
        .get(index)
        .ok_or_else(|| AppError::NotFound(format!("No download #{}", index)))?;
    let png = entry.png()?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&entry.filename)),
        ],
        png,
    )
        .into_response())
}

/// Serves every image of the latest batch as one ZIP archive
async fn download_all(session: Session) -> Result<Response, AppError> {
    if let Err(e) = check_auth(&TokenStore::new(session.clone())).await {
        return Ok(e.into_response());
    }

    let manifest = load_manifest(&session).await?;
    if manifest.is_empty() {
        set_flash(&session, Flash::error("There are no QR codes to download.")).await?;
        return Ok(Redirect::to("/?tab=generate").into_response());
    }

    let bundle = manifest.bundle_zip()?;

    tracing::info!(
        entries = manifest.entries.len(),
        bytes = bundle.len(),
        "Serving QR bundle"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, attachment(BUNDLE_FILENAME)),
        ],
        bundle,
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/downloads/all", get(download_all))
        .route("/downloads/:index", get(download_one))
}
