use std::time::Duration;

use color_eyre::eyre::Context;
use tracing::instrument;

pub mod generate;

pub use generate::GenerateContentResponse;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    #[instrument(name = "GeminiConfig::from_env")]
    pub fn from_env() -> color_eyre::Result<Self> {
        let api_key = std::env::var("GOOGLE_AI_STUDIO_API_KEY")
            .wrap_err("No Google AI Studio API key found in GOOGLE_AI_STUDIO_API_KEY")?;

        Ok(Self {
            api_key,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("request to Gemini failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gemini returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Gemini response could not be parsed: {0}")]
    Malformed(String),
    #[error("Gemini returned no text")]
    Empty,
}

/// A Gemini client with its own HTTP connection pool.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, timeout: Duration) -> color_eyre::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build Gemini HTTP client")?;

        Ok(Self { http, config })
    }
}
