use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use color_eyre::eyre::Context;
use db::cooking::NewIngredient;
use serde::Serialize;
use tracing::instrument;

use super::{NutritionLookup, ProviderError};

pub(crate) const DEFAULT_BASE_URL: &str = "https://trackapi.nutritionix.com";
pub(crate) const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

#[derive(Debug, Clone)]
pub(crate) struct NutritionixConfig {
    pub app_id: String,
    pub api_key: String,
    pub base_url: String,
    pub timezone: String,
}

impl NutritionixConfig {
    #[instrument(name = "NutritionixConfig::from_env")]
    pub(crate) fn from_env() -> color_eyre::Result<Self> {
        Ok(Self {
            app_id: std::env::var("NUTRITIONIX_APP_ID")
                .context("NUTRITIONIX_APP_ID env var missing")?,
            api_key: std::env::var("NUTRITIONIX_API_KEY")
                .context("NUTRITIONIX_API_KEY env var missing")?,
            base_url: std::env::var("NUTRITIONIX_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timezone: std::env::var("NUTRITIONIX_TIMEZONE")
                .unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string()),
        })
    }
}

#[derive(Serialize)]
struct NaturalNutrientsBody<'a> {
    query: String,
    timezone: &'a str,
}

/// One `"{quantity} {name}"` line per ingredient. Ingredients without a name
/// or with a zero quantity are left out.
pub(crate) fn build_query<'a>(
    ingredients: impl IntoIterator<Item = (&'a BigDecimal, &'a str)>,
) -> String {
    ingredients
        .into_iter()
        .filter(|(quantity, name)| !quantity.is_zero() && !name.trim().is_empty())
        .map(|(quantity, name)| format!("{quantity} {}", name.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone)]
pub(crate) struct NutritionixClient {
    http: reqwest::Client,
    config: NutritionixConfig,
}

impl NutritionixClient {
    pub(crate) fn new(config: NutritionixConfig, timeout: Duration) -> color_eyre::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build Nutritionix HTTP client")?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl NutritionLookup for NutritionixClient {
    #[instrument(skip_all, fields(ingredients = ingredients.len()), err)]
    async fn lookup(
        &self,
        ingredients: &[NewIngredient],
    ) -> Result<serde_json::Value, ProviderError> {
        let query = build_query(
            ingredients
                .iter()
                .map(|i| (&i.quantity, i.name.as_str())),
        );
        if query.is_empty() {
            return Err(ProviderError::EmptyQuery);
        }

        let url = format!(
            "{}/v2/natural/nutrients",
            self.config.base_url.trim_end_matches('/')
        );

        let res = self
            .http
            .post(url)
            .header("x-app-id", &self.config.app_id)
            .header("x-app-key", &self.config.api_key)
            .json(&NaturalNutrientsBody {
                query,
                timezone: &self.config.timezone,
            })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Nutritionix request failed");

            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = res.json::<serde_json::Value>().await?;

        Ok(payload)
    }
}
