//! Environment-driven configuration
//!
//! Binaries call `dotenv::dotenv().ok()` before `Config::from_env()` so a
//! local .env file can supply these values during development.

use crate::error::{MosaicError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| MosaicError::Config("DATABASE_URL is not set".to_string()))?;
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| MosaicError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Ok(Self {
            database_url,
            openai_api_key,
            openai_model,
            openai_base_url,
            port,
        })
    }
}
