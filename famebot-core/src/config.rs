use std::env;
use std::path::PathBuf;

use crate::error::{ConfigError, CoreError};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_CANDIDATES_PATH: &str = "celebrities.csv";
pub const DEFAULT_TWEET_LOG_PATH: &str = "tweet_log.txt";

/// Process-wide configuration, read once at startup and passed into the
/// components that need it. Credentials are required; the process must not
/// start without them. Paths and the model name have defaults.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub twitter_api_key: String,
    pub twitter_api_secret_key: String,
    pub twitter_bearer_token: String,
    pub twitter_access_token: String,
    pub twitter_access_token_secret: String,
    pub candidates_path: PathBuf,
    pub tweet_log_path: PathBuf,
}

impl BotConfig {
    /// Load configuration from environment variables. A `.env` file in the
    /// working directory is honored for development; it never overrides
    /// variables already set in the environment.
    pub fn from_env() -> Result<Self, CoreError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            gemini_api_key: require("GEMINI_API_KEY")?,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            twitter_api_key: require("TWITTER_API_KEY")?,
            twitter_api_secret_key: require("TWITTER_API_SECRET_KEY")?,
            twitter_bearer_token: require("TWITTER_BEARER_TOKEN")?,
            twitter_access_token: require("TWITTER_ACCESS_TOKEN")?,
            twitter_access_token_secret: require("TWITTER_ACCESS_TOKEN_SECRET")?,
            candidates_path: env::var("CELEBRITIES_CSV")
                .unwrap_or_else(|_| DEFAULT_CANDIDATES_PATH.to_string())
                .into(),
            tweet_log_path: env::var("TWEET_LOG")
                .unwrap_or_else(|_| DEFAULT_TWEET_LOG_PATH.to_string())
                .into(),
        })
    }
}

fn require(var_name: &str) -> Result<String, ConfigError> {
    env::var(var_name).map_err(|_| ConfigError::MissingEnvironmentVariable {
        var_name: var_name.to_string(),
    })
}
