//! Configuration and settings management
//!
//! Loads settings from environment variables and defines model constants.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Gemini API key
    pub gemini_api_key: String,

    /// Telegram user ID allowed to issue commands (acting-user-only bot)
    #[serde(rename = "owner_id")]
    pub owner_id_str: String,
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Telegram ID of the bot owner, if the configured value parses
    #[must_use]
    pub fn owner_id(&self) -> Option<i64> {
        self.owner_id_str.trim().parse::<i64>().ok()
    }
}

/// Gemini model used for every command
pub const MODEL_NAME: &str = "gemini-2.0-flash";

// Generation config for the recipe command ("cook mode")
/// Cook-mode sampling temperature
pub const COOK_TEMPERATURE: f32 = 0.35;
/// Cook-mode nucleus sampling bound
pub const COOK_TOP_P: f32 = 0.95;
/// Cook-mode top-k sampling bound
pub const COOK_TOP_K: i32 = 40;
/// Cook-mode output token ceiling
pub const COOK_MAX_OUTPUT_TOKENS: u32 = 1024;

/// Total attempts for one inference call
pub const GENERATE_MAX_ATTEMPTS: usize = 3;
/// Fixed delay between attempts after a transient error
pub const TRANSIENT_RETRY_DELAY_SECS: u64 = 2;

/// Poll interval while an uploaded file is processing
pub const UPLOAD_POLL_INTERVAL_SECS: u64 = 5;
/// Upper bound on processing polls before the upload is abandoned
pub const UPLOAD_POLL_MAX_ATTEMPTS: usize = 120;

/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096; 4000 leaves room for formatting.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

// Telegram API retry configuration (file download, send/edit operations)
/// Initial backoff delay for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum retry attempts for Telegram API operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// HTTP timeout for Gemini requests, `GEMINI_HTTP_TIMEOUT_SECS` or 120s default.
///
/// Uploads of large video files can legitimately take a while.
#[must_use]
pub fn get_gemini_http_timeout_secs() -> u64 {
    std::env::var("GEMINI_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(120)
}
