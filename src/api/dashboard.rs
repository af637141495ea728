use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::auth::{check_auth, expire_session};
use crate::api::middleware::session::{
    load_manifest, save_manifest, set_flash, take_flash, AppState, Flash,
};
use crate::error::AppError;
use crate::models::qr_record::QrState;
use crate::services::{
    api_client::{ApiError, QrApiClient},
    card_renderer::{badge_class, render_card, CardView},
    listing::{self, ListingView, Pagination},
    qr_issuer::{self, IssuanceError, IssueQrRequest},
    token_store::{SessionUser, TokenStore},
};

const NOT_FOUND_MESSAGE: &str = "QR ID not found.";

/// Sections of the dashboard. Only the active one is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Generate,
    Lookup,
    List,
}

impl Tab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Generate => "generate",
            Tab::Lookup => "lookup",
            Tab::List => "list",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub tab: Option<Tab>,
    pub page: Option<u32>,
    pub qrcode_id: Option<String>,
}

struct StateOption {
    value: &'static str,
    label: &'static str,
}

struct StateRow {
    value: &'static str,
    label: &'static str,
    class: String,
    count: usize,
}

struct IssuedCard {
    card_html: String,
    filename: String,
    download_index: usize,
}

struct ListingSection {
    state_rows: Vec<StateRow>,
    other: usize,
    total: usize,
    pagination: Pagination,
    cards: Vec<String>,
}

impl ListingSection {
    fn build(view: ListingView) -> Result<Self, AppError> {
        let state_rows = QrState::ALL
            .into_iter()
            .map(|state| StateRow {
                value: state.as_str(),
                label: state.label(),
                class: badge_class(state),
                count: view.stats.count(state),
            })
            .collect();

        Ok(Self {
            state_rows,
            other: view.stats.other,
            total: view.stats.total,
            pagination: view.pagination,
            cards: render_cards(&view.cards)?,
        })
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    user_name: String,
    user_role: String,
    active_tab: &'static str,
    flash: Option<Flash>,
    states: Vec<StateOption>,

    issued: Vec<IssuedCard>,
    failures: Vec<String>,
    generate_error: Option<String>,
    manifest_len: usize,

    lookup_id: String,
    lookup_exchange_action: String,
    lookup_card: Option<String>,
    lookup_message: Option<String>,
    lookup_error: Option<String>,

    listing: Option<ListingSection>,
    listing_error: Option<String>,
}

impl DashboardTemplate {
    fn new(user: &SessionUser, tab: Tab, flash: Option<Flash>) -> Self {
        Self {
            user_name: user.full_name.clone(),
            user_role: user.role.clone(),
            active_tab: tab.as_str(),
            flash,
            states: QrState::ALL
                .into_iter()
                .map(|state| StateOption {
                    value: state.as_str(),
                    label: state.label(),
                })
                .collect(),
            issued: Vec::new(),
            failures: Vec::new(),
            generate_error: None,
            manifest_len: 0,
            lookup_id: String::new(),
            lookup_exchange_action: String::new(),
            lookup_card: None,
            lookup_message: None,
            lookup_error: None,
            listing: None,
            listing_error: None,
        }
    }
}

fn render_cards(cards: &[CardView]) -> Result<Vec<String>, AppError> {
    cards
        .iter()
        .map(|card| render_card(card).map_err(AppError::from))
        .collect()
}

fn list_location(page: u32) -> String {
    format!("/?tab=list&page={}", page.max(1))
}

fn lookup_location(qrcode_id: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(qrcode_id.as_bytes()).collect();
    format!("/?tab=lookup&qrcode_id={}", encoded)
}

/// Path of the exchange action with the id as one escaped path segment.
fn exchange_location(qrcode_id: &str) -> String {
    // byte_serialize escapes '+' itself, so any '+' left stands for a space.
    let encoded = url::form_urlencoded::byte_serialize(qrcode_id.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("/qrcodes/{}/exchange", encoded)
}

/// Renders the dashboard with `query.tab` active. Activating the list tab
/// loads the requested page.
async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    session: Session,
) -> Result<Response, AppError> {
    let tokens = TokenStore::new(session.clone());
    let user = match check_auth(&tokens).await {
        Ok(user) => user,
        Err(e) => return Ok(e.into_response()),
    };
    let api = state.api.with_token(user.access_token.clone());

    let tab = query.tab.unwrap_or_default();
    let flash = take_flash(&session).await?;
    let mut page = DashboardTemplate::new(&user, tab, flash);

    match tab {
        Tab::Generate => {
            page.manifest_len = load_manifest(&session).await?.entries.len();
        }
        Tab::Lookup => {
            let qrcode_id = query.qrcode_id.unwrap_or_default().trim().to_string();
            if !qrcode_id.is_empty() {
                match api.get_qr(&qrcode_id).await {
                    Ok(record) => {
                        let card = CardView::from_record(&record, &state.dates);
                        page.lookup_card = Some(render_card(&card)?);
                    }
                    Err(ApiError::NotFound) => {
                        page.lookup_message = Some(NOT_FOUND_MESSAGE.to_string());
                    }
                    Err(ApiError::Unauthorized) => return Ok(expire_session(&tokens).await),
                    Err(e) => page.lookup_error = Some(e.to_string()),
                }
            }
            page.lookup_exchange_action = exchange_location(&qrcode_id);
            page.lookup_id = qrcode_id;
        }
        Tab::List => {
            let requested = query.page.unwrap_or(1);
            match load_listing(&api, &state, requested).await {
                Ok(section) => page.listing = Some(section),
                Err(AppError::Api(ApiError::Unauthorized)) => {
                    return Ok(expire_session(&tokens).await)
                }
                Err(AppError::Api(e)) => {
                    tracing::error!(error = %e, page = requested, "Failed to load QR codes");
                    page.listing_error = Some(format!("Failed to load QR codes: {}", e));
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(page.into_response())
}

async fn load_listing(
    api: &QrApiClient,
    state: &AppState,
    page: u32,
) -> Result<ListingSection, AppError> {
    let view = listing::load_page(api, page, state.config.page_size, &state.dates).await?;
    ListingSection::build(view)
}

#[derive(Debug, Deserialize)]
struct GenerateForm {
    value: String,
    state: String,
    count: String,
    #[serde(default)]
    filename_prefix: String,
}

/// Runs an issuance batch and shows its cards on the generate tab.
async fn generate(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<GenerateForm>,
) -> Result<Response, AppError> {
    let tokens = TokenStore::new(session.clone());
    let user = match check_auth(&tokens).await {
        Ok(user) => user,
        Err(e) => return Ok(e.into_response()),
    };
    let api = state.api.with_token(user.access_token.clone());

    let mut page = DashboardTemplate::new(&user, Tab::Generate, None);

    let request = match IssueQrRequest::parse(
        &form.value,
        &form.state,
        &form.count,
        &form.filename_prefix,
        state.dates.today(),
    ) {
        Ok(request) => request,
        Err(e) => {
            page.generate_error = Some(e.to_string());
            page.manifest_len = load_manifest(&session).await?.entries.len();
            return Ok(page.into_response());
        }
    };

    let report = match qr_issuer::issue_batch(
        &api,
        &request,
        state.config.qr_module_size,
        &state.dates,
    )
    .await
    {
        Ok(report) => report,
        Err(IssuanceError::Unauthorized) => return Ok(expire_session(&tokens).await),
        Err(e) => {
            page.generate_error = Some(e.to_string());
            return Ok(page.into_response());
        }
    };

    let manifest = report.manifest();
    save_manifest(&session, &manifest).await?;

    page.manifest_len = manifest.entries.len();
    page.failures = report
        .failures
        .iter()
        .map(|failure| format!("#{}: {}", failure.index, failure.error))
        .collect();
    page.issued = report
        .issued
        .iter()
        .enumerate()
        .map(|(download_index, item)| {
            Ok(IssuedCard {
                card_html: render_card(&item.card)?,
                filename: item.download.filename.clone(),
                download_index,
            })
        })
        .collect::<Result<_, AppError>>()?;

    Ok(page.into_response())
}

#[derive(Template)]
#[template(path = "confirm_delete.html")]
struct ConfirmDeleteTemplate {
    state_value: &'static str,
    state_label: &'static str,
    state_class: String,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct DeleteForm {
    state: String,
    #[serde(default)]
    confirm: Option<String>,
    #[serde(default)]
    page: Option<u32>,
}

/// Deletes every record in one state once the user confirmed it. The list is
/// reloaded from the backend afterwards, never edited locally.
async fn delete_by_state(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<DeleteForm>,
) -> Result<Response, AppError> {
    let tokens = TokenStore::new(session.clone());
    let user = match check_auth(&tokens).await {
        Ok(user) => user,
        Err(e) => return Ok(e.into_response()),
    };
    let page = form.page.unwrap_or(1).max(1);

    let qr_state: QrState = match form.state.parse() {
        Ok(qr_state) => qr_state,
        Err(e) => {
            set_flash(&session, Flash::error(format!("Cannot delete: {}", e))).await?;
            return Ok(Redirect::to(&list_location(page)).into_response());
        }
    };

    if form.confirm.as_deref() != Some("yes") {
        return Ok(ConfirmDeleteTemplate {
            state_value: qr_state.as_str(),
            state_label: qr_state.label(),
            state_class: badge_class(qr_state),
            page,
        }
        .into_response());
    }

    let api = state.api.with_token(user.access_token);
    let flash = match api.delete_by_state(qr_state).await {
        Ok(deleted) => Flash::info(deleted.message),
        Err(ApiError::Unauthorized) => return Ok(expire_session(&tokens).await),
        Err(e) => {
            tracing::error!(state = %qr_state, error = %e, "Delete by state failed");
            Flash::error(format!("Failed to delete QR codes: {}", e))
        }
    };
    set_flash(&session, flash).await?;

    Ok(Redirect::to(&list_location(page)).into_response())
}

/// Redeems a code and returns to its lookup view.
async fn exchange(
    State(state): State<AppState>,
    Path(qrcode_id): Path<String>,
    session: Session,
) -> Result<Response, AppError> {
    let tokens = TokenStore::new(session.clone());
    let user = match check_auth(&tokens).await {
        Ok(user) => user,
        Err(e) => return Ok(e.into_response()),
    };
    let api = state.api.with_token(user.access_token);

    let flash = match api.exchange_qr(&qrcode_id).await {
        Ok(exchanged) => Flash::info(exchanged.message),
        Err(ApiError::Unauthorized) => return Ok(expire_session(&tokens).await),
        Err(ApiError::NotFound) => Flash::error(NOT_FOUND_MESSAGE),
        Err(ApiError::Status { message, .. }) => Flash::error(message),
        Err(e) => Flash::error(format!("Exchange failed: {}", e)),
    };
    set_flash(&session, flash).await?;

    Ok(Redirect::to(&lookup_location(&qrcode_id)).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/generate", post(generate))
        .route("/qrcodes/delete", post(delete_by_state))
        .route("/qrcodes/:id/exchange", post(exchange))
}
