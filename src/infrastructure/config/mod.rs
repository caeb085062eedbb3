use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub admin_token: String,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Speech provider
    pub speech_api_base: String,
    pub speech_api_key: String,
    pub speech_models: Vec<String>,
    pub speech_voice: String,
    // Condensed narration
    pub condense_model: String,
    pub condense_word_threshold: usize,
    // Worker
    pub worker_enabled: bool,
    pub worker_poll_interval_secs: u64,
    pub worker_batch_size: i64,
    pub lease_duration_secs: i64,
    pub record_stale_after_secs: i64,
    // Status streaming
    pub stream_poll_interval_ms: u64,
    pub stream_max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let config = Config {
            database_url: env::var("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            admin_token: env::var("ADMIN_TOKEN")?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                })?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
            speech_api_base: env::var("SPEECH_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            speech_api_key: env::var("SPEECH_API_KEY")?,
            speech_models: env::var("SPEECH_MODELS")
                .unwrap_or_else(|_| "gpt-4o-mini-tts,tts-1-hd,tts-1".to_string())
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            speech_voice: env::var("SPEECH_VOICE").unwrap_or_else(|_| "alloy".to_string()),
            condense_model: env::var("CONDENSE_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            condense_word_threshold: env::var("CONDENSE_WORD_THRESHOLD")
                .unwrap_or_else(|_| "1400".to_string())
                .parse()?,
            worker_enabled: env::var("WORKER_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<String>()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(true),
            worker_poll_interval_secs: env::var("WORKER_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            worker_batch_size: env::var("WORKER_BATCH_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            lease_duration_secs: env::var("LEASE_DURATION_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            record_stale_after_secs: env::var("RECORD_STALE_AFTER_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            stream_poll_interval_ms: env::var("STREAM_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "1200".to_string())
                .parse()?,
            stream_max_lifetime_secs: env::var("STREAM_MAX_LIFETIME_SECS")
                .unwrap_or_else(|_| "25".to_string())
                .parse()?,
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}
