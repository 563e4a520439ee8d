use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Default lifetime of a cached rule snapshot.
pub const DEFAULT_RULE_CACHE_TTL_SECS: u64 = 3600;

/// Hard cap on chat history page size.
pub const DEFAULT_CHAT_HISTORY_MAX: i64 = 100;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rule_cache_ttl: Duration,
    pub chat_history_max: i64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let rule_cache_ttl_secs: u64 = env::var("MODERATION_CACHE_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_RULE_CACHE_TTL_SECS.to_string())
            .parse()
            .context("MODERATION_CACHE_TTL_SECS must be a whole number of seconds")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            rule_cache_ttl: Duration::from_secs(rule_cache_ttl_secs),
            chat_history_max: env::var("CHAT_HISTORY_MAX")
                .unwrap_or_else(|_| DEFAULT_CHAT_HISTORY_MAX.to_string())
                .parse()
                .context("CHAT_HISTORY_MAX must be a valid number")?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|origins| parse_origins(&origins))
                .unwrap_or_default(),
        })
    }

    /// Configuration for in-process tests; never touches the environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            port: 0,
            rule_cache_ttl: Duration::from_secs(DEFAULT_RULE_CACHE_TTL_SECS),
            chat_history_max: DEFAULT_CHAT_HISTORY_MAX,
            allowed_origins: Vec::new(),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
