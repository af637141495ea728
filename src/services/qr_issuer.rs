use chrono::NaiveDate;
use std::time::Instant;

use crate::models::qr_record::{CreateQrData, QrRecord, QrState, UpdateQrData};
use crate::services::api_client::{ApiError, QrApiClient};
use crate::services::card_renderer::{CardView, DateFormatter};
use crate::services::downloads::{download_filename, DownloadEntry, DownloadManifest};
use crate::services::qr_generator::{self, QrGenerationError};

/// Upper bound on codes issued by one form submission.
pub const MAX_BATCH_SIZE: u32 = 500;

#[derive(thiserror::Error, Debug)]
pub enum IssuanceError {
    #[error("Invalid issuance request: {0}")]
    Validation(String),

    #[error("Session expired or invalid")]
    Unauthorized,
}

/// Why a single item of a batch did not complete.
#[derive(thiserror::Error, Debug)]
pub enum ItemError {
    #[error("Create request failed: {0}")]
    Create(ApiError),

    #[error("Backend returned no QR id")]
    MissingId,

    #[error("QR rendering failed: {0}")]
    Render(#[from] QrGenerationError),

    #[error("Image update failed for {qrcode_id}: {source}")]
    Update {
        qrcode_id: String,
        source: ApiError,
    },
}

/// A validated issuance form.
#[derive(Debug, Clone)]
pub struct IssueQrRequest {
    pub value: f64,
    pub state: QrState,
    pub count: u32,
    pub filename_prefix: String,
    pub creation_date: NaiveDate,
}

impl IssueQrRequest {
    /// Validates raw form input. `count` must be an integer in
    /// `1..=MAX_BATCH_SIZE` and `value` a finite, non-negative number.
    pub fn parse(
        value: &str,
        state: &str,
        count: &str,
        filename_prefix: &str,
        creation_date: NaiveDate,
    ) -> Result<Self, IssuanceError> {
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| IssuanceError::Validation(format!("value is not a number: {}", value)))?;
        if !value.is_finite() || value < 0.0 {
            return Err(IssuanceError::Validation(
                "value must be a non-negative number".to_string(),
            ));
        }

        let count: u32 = count
            .trim()
            .parse()
            .map_err(|_| IssuanceError::Validation(format!("count is not an integer: {}", count)))?;
        if count == 0 {
            return Err(IssuanceError::Validation(
                "count must be at least 1".to_string(),
            ));
        }
        if count > MAX_BATCH_SIZE {
            return Err(IssuanceError::Validation(format!(
                "count must be at most {}",
                MAX_BATCH_SIZE
            )));
        }

        let state: QrState = state
            .trim()
            .parse()
            .map_err(|e: crate::models::qr_record::UnknownState| {
                IssuanceError::Validation(e.to_string())
            })?;

        Ok(Self {
            value,
            state,
            count,
            filename_prefix: filename_prefix.trim().to_string(),
            creation_date,
        })
    }

    /// Creation timestamp sent to the backend: midnight of the request date.
    pub fn creation_timestamp(&self) -> String {
        format!("{}T00:00:00.000Z", self.creation_date.format("%Y-%m-%d"))
    }
}

/// A fully issued item: created, rendered and updated with its image.
#[derive(Debug, Clone)]
pub struct IssuedQr {
    pub index: u32,
    pub qrcode_id: String,
    pub card: CardView,
    pub download: DownloadEntry,
}

#[derive(Debug)]
pub struct ItemFailure {
    pub index: u32,
    pub error: ItemError,
}

#[derive(Debug, Default)]
pub struct IssuanceReport {
    pub issued: Vec<IssuedQr>,
    pub failures: Vec<ItemFailure>,
}

impl IssuanceReport {
    pub fn manifest(&self) -> DownloadManifest {
        DownloadManifest {
            entries: self
                .issued
                .iter()
                .map(|item| item.download.clone())
                .collect(),
        }
    }
}

/// Issues `request.count` QR codes one after another.
///
/// Each item is created without an image, rendered from the id the backend
/// assigned, then replaced with the image attached. Items run strictly in
/// sequence. A token rejected at creation aborts the batch; any other
/// failure, a rejected image update included, only skips that item. Records
/// left without an image are not rolled back.
#[tracing::instrument(skip(client, request, dates), fields(count = request.count, state = %request.state))]
pub async fn issue_batch(
    client: &QrApiClient,
    request: &IssueQrRequest,
    module_size: u32,
    dates: &DateFormatter,
) -> Result<IssuanceReport, IssuanceError> {
    let start_time = Instant::now();
    let mut report = IssuanceReport::default();

    for index in 1..=request.count {
        match issue_one(client, request, index, module_size, dates).await {
            Ok(issued) => {
                tracing::info!(index, qrcode_id = %issued.qrcode_id, "QR issued");
                report.issued.push(issued);
            }
            Err(ItemError::Create(ApiError::Unauthorized)) => {
                tracing::warn!(
                    index,
                    issued = report.issued.len(),
                    "Token rejected, aborting issuance batch"
                );
                return Err(IssuanceError::Unauthorized);
            }
            Err(error) => {
                tracing::warn!(index, error = %error, "QR issuance item failed");
                report.failures.push(ItemFailure { index, error });
            }
        }
    }

    tracing::info!(
        issued = report.issued.len(),
        failed = report.failures.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Issuance batch finished"
    );

    Ok(report)
}

async fn issue_one(
    client: &QrApiClient,
    request: &IssueQrRequest,
    index: u32,
    module_size: u32,
    dates: &DateFormatter,
) -> Result<IssuedQr, ItemError> {
    let creation_date = request.creation_timestamp();

    // 1. Create the placeholder record
    let created = client
        .create_qr(&CreateQrData {
            new_value: request.value,
            old_value: 0.0,
            creation_date: creation_date.clone(),
            state: request.state,
        })
        .await
        .map_err(ItemError::Create)?;

    // 2. The id is the QR payload; without it there is nothing to render
    let qrcode_id = created.assigned_id().ok_or(ItemError::MissingId)?.to_string();

    // 3-4. Render and encode
    let rendered = qr_generator::render_qr(&qrcode_id, module_size)?;

    // 5. Replace the record with the image attached
    client
        .update_qr(
            &qrcode_id,
            &UpdateQrData {
                new_value: request.value,
                old_value: 0.0,
                creation_date: creation_date.clone(),
                state: request.state,
                qr_image: rendered.data_url.clone(),
            },
        )
        .await
        .map_err(|source| ItemError::Update {
            qrcode_id: qrcode_id.clone(),
            source,
        })?;

    let record = QrRecord {
        qrcode_id: qrcode_id.clone(),
        new_value: created.new_value.unwrap_or(request.value),
        old_value: created.old_value.unwrap_or(0.0),
        state: created
            .state
            .clone()
            .unwrap_or_else(|| request.state.as_str().to_string()),
        creation_date,
        used_date: None,
        qr_image: Some(rendered.data_url),
    };

    Ok(IssuedQr {
        index,
        card: CardView::from_record(&record, dates),
        download: DownloadEntry::new(
            &qrcode_id,
            download_filename(&request.filename_prefix, index),
            &rendered.png,
        ),
        qrcode_id,
    })
}
