use askama::Template;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::models::qr_record::{QrRecord, QrState};
use crate::services::qr_generator::PNG_DATA_URL_PREFIX;

pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Formats backend timestamps in one fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct DateFormatter {
    offset: FixedOffset,
}

impl DateFormatter {
    /// `None` when the offset is outside ±23 hours.
    pub fn from_utc_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours.checked_mul(3600)?).map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Today's date as seen in the display offset.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    /// Renders `raw` as `YYYY-MM-DD HH:MM:SS` in the display offset.
    /// Timestamps without an offset are taken as UTC. Input that does not
    /// parse is returned unchanged.
    pub fn format(&self, raw: &str) -> String {
        match parse_timestamp(raw.trim()) {
            Some(utc) => utc
                .with_timezone(&self.offset)
                .format(DISPLAY_FORMAT)
                .to_string(),
            None => {
                tracing::debug!(value = %raw, "Leaving unparseable date as is");
                raw.to_string()
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn format_amount(value: f64) -> String {
    format!("${:.2}", value)
}

/// Display-ready projection of a `QrRecord`.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub qrcode_id: String,
    pub image_src: Option<String>,
    pub new_value: String,
    pub old_value: Option<String>,
    pub state_label: String,
    pub state_class: String,
    pub creation_date: String,
    pub used_date: Option<String>,
}

impl CardView {
    pub fn from_record(record: &QrRecord, dates: &DateFormatter) -> Self {
        let (state_label, state_class) = match record.known_state() {
            Some(state) => (state.label().to_string(), badge_class(state)),
            None => (record.state.clone(), "state-unknown".to_string()),
        };

        Self {
            qrcode_id: record.qrcode_id.clone(),
            image_src: record
                .qr_image
                .as_deref()
                .filter(|image| !image.is_empty())
                .map(image_src),
            new_value: format_amount(record.new_value),
            old_value: (record.old_value > 0.0).then(|| format_amount(record.old_value)),
            state_label,
            state_class,
            creation_date: dates.format(&record.creation_date),
            used_date: record
                .used_date
                .as_deref()
                .filter(|date| !date.is_empty())
                .map(|date| dates.format(date)),
        }
    }
}

pub fn badge_class(state: QrState) -> String {
    format!("state-{}", state.as_str())
}

fn image_src(image: &str) -> String {
    if image.starts_with("data:") {
        image.to_string()
    } else {
        format!("{}{}", PNG_DATA_URL_PREFIX, image)
    }
}

#[derive(Template)]
#[template(path = "partials/qr_card.html")]
pub struct QrCardTemplate<'a> {
    pub card: &'a CardView,
}

/// Renders one card as an HTML fragment.
pub fn render_card(card: &CardView) -> Result<String, askama::Error> {
    QrCardTemplate { card }.render()
}
