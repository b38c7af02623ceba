use std::{sync::Arc, time::Duration};

use color_eyre::eyre::Context;
use db::setup_db_pool;
use gemini::{GeminiClient, GeminiConfig};
use sqlx::PgPool;
use tracing::instrument;

use crate::providers::{
    GeminiGenerator, NutritionLookup, NutritionixClient, NutritionixConfig, RecipeGenerator,
};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub provider_timeout: Duration,
}

impl AppConfig {
    #[instrument(name = "AppConfig::from_env")]
    pub fn from_env() -> color_eyre::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").wrap_err("Missing DATABASE_URL, needed for app launch")?;

        let port = match std::env::var("PORT") {
            Ok(port) => port.parse().wrap_err("Invalid PORT, expected a u16")?,
            Err(_) => DEFAULT_PORT,
        };

        let timeout_secs = match std::env::var("PROVIDER_TIMEOUT_SECS") {
            Ok(secs) => secs
                .parse()
                .wrap_err("Invalid PROVIDER_TIMEOUT_SECS, expected whole seconds")?,
            Err(_) => DEFAULT_PROVIDER_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url,
            port,
            provider_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub db: PgPool,
    pub generator: Arc<dyn RecipeGenerator>,
    pub nutrition: Arc<dyn NutritionLookup>,
}

impl AppState {
    #[instrument(name = "AppState::from_config", skip_all)]
    pub async fn from_config(config: &AppConfig) -> color_eyre::Result<Self> {
        let gemini = GeminiClient::new(GeminiConfig::from_env()?, config.provider_timeout)?;
        let nutritionix =
            NutritionixClient::new(NutritionixConfig::from_env()?, config.provider_timeout)?;

        let db = setup_db_pool(&config.database_url)
            .await
            .wrap_err("Failed to set up the database")?;

        Ok(Self {
            db,
            generator: Arc::new(GeminiGenerator::new(gemini)),
            nutrition: Arc::new(nutritionix),
        })
    }
}
