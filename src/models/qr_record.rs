use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle states a QR record can be in. The backend owns every transition;
/// the console only displays and filters by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QrState {
    #[serde(rename = "valido")]
    Valid,
    #[serde(rename = "usado")]
    Used,
    #[serde(rename = "expirado")]
    Expired,
    #[serde(rename = "invalidado")]
    Invalidated,
}

impl QrState {
    pub const ALL: [QrState; 4] = [
        QrState::Valid,
        QrState::Used,
        QrState::Expired,
        QrState::Invalidated,
    ];

    /// Value exchanged with the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            QrState::Valid => "valido",
            QrState::Used => "usado",
            QrState::Expired => "expirado",
            QrState::Invalidated => "invalidado",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QrState::Valid => "Valid",
            QrState::Used => "Used",
            QrState::Expired => "Expired",
            QrState::Invalidated => "Invalidated",
        }
    }
}

impl fmt::Display for QrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown QR state: {0}")]
pub struct UnknownState(pub String);

impl FromStr for QrState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QrState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// A QR record as returned by the backend.
///
/// `state` stays a plain string so that a record carrying a state this
/// console does not know about still lists instead of failing the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrRecord {
    pub qrcode_id: String,
    pub new_value: f64,
    #[serde(default, deserialize_with = "amount_or_zero")]
    pub old_value: f64,
    pub state: String,
    pub creation_date: String,
    #[serde(default)]
    pub used_date: Option<String>,
    #[serde(default)]
    pub qr_image: Option<String>,
}

impl QrRecord {
    pub fn known_state(&self) -> Option<QrState> {
        self.state.parse().ok()
    }
}

fn amount_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Body of the first issuance phase: a record without its image.
#[derive(Debug, Clone, Serialize)]
pub struct CreateQrData {
    pub new_value: f64,
    pub old_value: f64,
    pub creation_date: String,
    pub state: QrState,
}

/// Full replacement body for `PUT /api/qrdata/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateQrData {
    pub new_value: f64,
    pub old_value: f64,
    pub creation_date: String,
    pub state: QrState,
    pub qr_image: String,
}

/// Response of the creation call. Every field is optional because a missing
/// id must be detected and reported rather than failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateQrResponse {
    #[serde(default)]
    pub qrcode_id: Option<String>,
    #[serde(default)]
    pub new_value: Option<f64>,
    #[serde(default)]
    pub old_value: Option<f64>,
    #[serde(default)]
    pub state: Option<String>,
}

impl CreateQrResponse {
    pub fn assigned_id(&self) -> Option<&str> {
        self.qrcode_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteByStateResponse {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub message: String,
    #[serde(default)]
    pub new_value: Option<f64>,
    #[serde(default)]
    pub old_value: Option<f64>,
}

/// One page of records plus the total the backend reported, if any.
#[derive(Debug, Clone)]
pub struct QrPage {
    pub records: Vec<QrRecord>,
    pub total: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wire_values() {
        assert_eq!(serde_json::to_string(&QrState::Valid).unwrap(), "\"valido\"");
        assert_eq!("invalidado".parse::<QrState>(), Ok(QrState::Invalidated));
        assert!("valid".parse::<QrState>().is_err());
    }

    #[test]
    fn test_record_defaults_missing_fields() {
        let record: QrRecord = serde_json::from_str(
            r#"{"qrcode_id":"abc123","new_value":5.0,"old_value":null,"state":"usado","creation_date":"2024-01-01T00:00:00"}"#,
        )
        .unwrap();

        assert_eq!(record.old_value, 0.0);
        assert!(record.used_date.is_none());
        assert!(record.qr_image.is_none());
        assert_eq!(record.known_state(), Some(QrState::Used));
    }

    #[test]
    fn test_assigned_id_rejects_blank() {
        let response = CreateQrResponse {
            qrcode_id: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(response.assigned_id(), None);

        let response = CreateQrResponse::default();
        assert_eq!(response.assigned_id(), None);
    }
}
