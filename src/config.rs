use std::time::Duration;

pub const DEFAULT_RATE_API_URL: &str = "https://hexarate.paikama.co/api/rates/latest";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value \"{value}\"")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    // mandatory fields
    pub database_url: String,
    pub jwt_secret: String,
    // optional fields
    pub max_connection_pooling: u32,
    pub port: u16,
    pub log_file: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub rate_api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            max_connection_pooling: parse_or(&lookup, "MAX_CONNECTION_POOLING", 5)?,
            port: parse_or(&lookup, "PORT", 3000)?,
            log_file: lookup("LOG_FILE").unwrap_or_else(|| "app.log".to_string()),
            access_token_ttl: Duration::from_secs(parse_or(&lookup, "ACCESS_TOKEN_TTL_SECS", 15 * 60)?),
            refresh_token_ttl: Duration::from_secs(parse_or(&lookup, "REFRESH_TOKEN_TTL_SECS", 60 * 60)?),
            rate_api_url: lookup("RATE_API_URL").unwrap_or_else(|| DEFAULT_RATE_API_URL.to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
