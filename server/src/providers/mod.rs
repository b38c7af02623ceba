//! The two outbound services the recipe flow depends on. Failures come back
//! as a [`ProviderError`] value.

use async_trait::async_trait;
use db::cooking::NewIngredient;

pub(crate) mod generation;
pub(crate) mod nutrition;

pub(crate) use generation::{GeminiGenerator, GeneratedRecipe, GenerationRequest};
pub(crate) use nutrition::{NutritionixClient, NutritionixConfig};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("provider returned an empty response")]
    Empty,
    #[error("no ingredients with a name and quantity to look up")]
    EmptyQuery,
}

impl ProviderError {
    /// The `{"error": ...}` payload stored or returned in place of a result.
    pub(crate) fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

#[async_trait]
pub(crate) trait RecipeGenerator: Send + Sync + std::fmt::Debug {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GeneratedRecipe, ProviderError>;
}

#[async_trait]
pub(crate) trait NutritionLookup: Send + Sync + std::fmt::Debug {
    async fn lookup(
        &self,
        ingredients: &[NewIngredient],
    ) -> Result<serde_json::Value, ProviderError>;
}
