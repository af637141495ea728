use serde::Deserialize;

use crate::services::qr_generator::MAX_MODULE_SIZE;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub host: String,
    pub port: u16,

    // Listing
    pub page_size: u32,

    // Rendering
    pub display_utc_offset_hours: i32,
    pub qr_module_size: u32,

    // HTTP client
    pub request_timeout_secs: Option<u64>,

    // Security
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        Self::from_source(config::Environment::default().separator("__"))
    }

    /// Reads settings from `source` on top of the defaults. Present but
    /// malformed values are errors, never silently replaced by a default.
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("page_size", 200)?
            .set_default("display_utc_offset_hours", -6)?
            .set_default("qr_module_size", 4)?
            .set_default("secure_cookies", false)?
            .add_source(source)
            .build()?;

        let settings = Self {
            api_base_url: config.get("api_base_url")?,
            host: config.get("host")?,
            port: config.get("port")?,

            page_size: config.get("page_size")?,

            display_utc_offset_hours: config.get("display_utc_offset_hours")?,
            qr_module_size: config.get("qr_module_size")?,

            request_timeout_secs: match config.get::<u64>("request_timeout_secs") {
                Ok(secs) => Some(secs),
                Err(config::ConfigError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },

            secure_cookies: config.get("secure_cookies")?,
        };
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.page_size == 0 {
            return Err(config::ConfigError::Message(
                "page_size must be greater than 0".to_string(),
            ));
        }
        if !(-23..=23).contains(&self.display_utc_offset_hours) {
            return Err(config::ConfigError::Message(format!(
                "display_utc_offset_hours out of range: {}",
                self.display_utc_offset_hours
            )));
        }
        if !(1..=MAX_MODULE_SIZE).contains(&self.qr_module_size) {
            return Err(config::ConfigError::Message(format!(
                "qr_module_size must be between 1 and {}",
                MAX_MODULE_SIZE
            )));
        }
        Ok(())
    }
}
