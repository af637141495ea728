use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize, Serializer};

/// Login form fields, forwarded form-encoded to `POST /token`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: Secret<String>,
}

/// Successful `POST /token` response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Secret<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
}

/// Registration form, sent as JSON to `POST /api/register`.
#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterForm {
    pub username: String,
    #[serde(serialize_with = "expose")]
    pub password: Secret<String>,
    pub full_name: String,
    pub role: String,
}

fn expose<S>(secret: &Secret<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

/// Error body of FastAPI-style endpoints.
#[derive(Debug, Deserialize)]
pub struct DetailBody {
    pub detail: Option<serde_json::Value>,
}

impl DetailBody {
    /// Flattens `detail` into displayable text; validation errors come back
    /// as a list of objects rather than a string.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
