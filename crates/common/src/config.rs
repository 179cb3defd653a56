//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (PostgreSQL)
    pub database_url: String,

    /// AI completion provider
    pub ai_provider: String,
    pub ai_api_key: String,
    pub ai_base_url: Option<String>,
    pub ai_model: String,
    pub ai_timeout_secs: u64,

    /// Runtime configuration
    pub rust_log: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?,

            ai_provider: env::var("AI_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
            ai_api_key: env::var("AI_API_KEY")
                .map_err(|_| anyhow::anyhow!("AI_API_KEY is required"))?,
            ai_base_url: env::var("AI_BASE_URL").ok(),
            ai_model: env::var("AI_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            ai_timeout_secs: env::var("AI_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "livedesk=debug".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        };

        Ok(config)
    }
}
