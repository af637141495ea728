use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use url::Url;

use crate::models::auth::{DetailBody, RegisterForm, TokenResponse};
use crate::models::qr_record::{
    CreateQrData, CreateQrResponse, DeleteByStateResponse, ExchangeResponse, QrPage, QrRecord,
    QrState, UpdateQrData,
};

/// Header some deployments use to report the size of the whole collection.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Session expired or invalid")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Client for the QR backend.
///
/// Cloning is cheap; `with_token` derives a per-user client from the shared
/// one held in the application state.
#[derive(Clone)]
pub struct QrApiClient {
    client: Client,
    base_url: Url,
    token: Option<Secret<String>>,
}

impl QrApiClient {
    pub fn new(api_base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(api_base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(api_base_url.to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            token: None,
        })
    }

    pub fn with_token(&self, token: Secret<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Exchanges credentials for an access token.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<TokenResponse, ApiError> {
        let url = self.endpoint(&["token"])?;

        let response = self
            .client
            .post(url)
            .form(&[("username", username), ("password", password.expose_secret().as_str())])
            .send()
            .await?;

        let response = check_status(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        tracing::info!(role = %token.role, "Login succeeded");

        Ok(token)
    }

    #[tracing::instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: &RegisterForm) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "register"])?;

        let response = self.client.post(url).json(form).send().await?;
        check_status(response).await?;

        tracing::info!("User registered");

        Ok(())
    }

    /// First issuance phase: creates a record without an image.
    #[tracing::instrument(skip(self, data), fields(state = %data.state))]
    pub async fn create_qr(&self, data: &CreateQrData) -> Result<CreateQrResponse, ApiError> {
        let url = self.endpoint(&["api", "qrdata"])?;

        let response = self
            .authorize(self.client.post(url))
            .json(data)
            .send()
            .await?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Second issuance phase: full replace of the record, image included.
    #[tracing::instrument(skip(self, data))]
    pub async fn update_qr(&self, qrcode_id: &str, data: &UpdateQrData) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "qrdata", qrcode_id])?;

        let response = self
            .authorize(self.client.put(url))
            .json(data)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_qr(&self, qrcode_id: &str) -> Result<QrRecord, ApiError> {
        let url = self.endpoint(&["api", "qrdata", qrcode_id])?;

        let response = self.authorize(self.client.get(url)).send().await?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Fetches one page; the backend applies `skip`/`limit`.
    #[tracing::instrument(skip(self))]
    pub async fn list_qr(&self, skip: u64, limit: u32) -> Result<QrPage, ApiError> {
        let mut url = self.endpoint(&["api", "qrcodes"])?;
        url.query_pairs_mut()
            .append_pair("skip", &skip.to_string())
            .append_pair("limit", &limit.to_string());

        let response = self.authorize(self.client.get(url)).send().await?;
        let response = check_status(response).await?;

        let total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        // Anything other than an array is treated as an empty page.
        let records = if body.is_array() {
            serde_json::from_value(body).map_err(|e| ApiError::Parse(e.to_string()))?
        } else {
            tracing::warn!(body = %body, "Listing response is not an array");
            Vec::new()
        };

        Ok(QrPage { records, total })
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_by_state(&self, state: QrState) -> Result<DeleteByStateResponse, ApiError> {
        let url = self.endpoint(&["api", "qrdata", "state", state.as_str()])?;

        let response = self.authorize(self.client.delete(url)).send().await?;

        let response = check_status(response).await?;
        let deleted: DeleteByStateResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        tracing::info!(message = %deleted.message, "Records deleted by state");

        Ok(deleted)
    }

    /// Redeems a code through the public exchange endpoint.
    #[tracing::instrument(skip(self))]
    pub async fn exchange_qr(&self, qrcode_id: &str) -> Result<ExchangeResponse, ApiError> {
        let url = self.endpoint(&["api", "qrdata", "exchange", qrcode_id])?;

        let response = self.authorize(self.client.put(url)).send().await?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// Maps non-success statuses onto `ApiError`, extracting the backend's
/// `detail` message when there is one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => {
            tracing::warn!("Backend rejected the access token");
            Err(ApiError::Unauthorized)
        }
        StatusCode::NOT_FOUND => Err(ApiError::NotFound),
        _ => {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<DetailBody>(&body)
                .ok()
                .and_then(|detail| detail.message())
                .unwrap_or(body);

            tracing::error!(
                status = %status,
                error = %message,
                "Backend request failed"
            );

            Err(ApiError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}
