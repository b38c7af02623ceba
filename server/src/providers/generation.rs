use std::fmt::Write as _;

use async_trait::async_trait;
use db::cooking::{Cuisine, DietaryRestriction, Difficulty};
use gemini::{GeminiClient, GeminiError};

use super::{ProviderError, RecipeGenerator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GenerationRequest {
    pub ingredients: Vec<String>,
    pub cuisine: Cuisine,
    pub dietary_restrictions: DietaryRestriction,
    pub difficulty: Difficulty,
    pub allergens: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GeneratedRecipe {
    pub text: String,
}

impl GenerationRequest {
    pub(crate) fn prompt(&self) -> String {
        let mut prompt = format!(
            "Generate a {difficulty} {cuisine} recipe for a {diet} diet using ingredients: \
             {ingredients}.\n",
            difficulty = self.difficulty,
            cuisine = self.cuisine,
            diet = self.dietary_restrictions,
            ingredients = self.ingredients.join(", "),
        );

        if let Some(allergens) = &self.allergens {
            let _ = writeln!(prompt, "Avoid these allergens: {allergens}.");
        }

        prompt.push_str(
            "\nInclude:\n\
             - Title\n\
             - Description\n\
             - Step-by-step instructions\n\
             - Substitution suggestions\n\
             - Serving tips",
        );

        prompt
    }
}

impl From<GeminiError> for ProviderError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Request(e) => ProviderError::from(e),
            GeminiError::Status { status, body } => ProviderError::Status { status, body },
            GeminiError::Malformed(msg) => ProviderError::Malformed(msg),
            GeminiError::Empty => ProviderError::Empty,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GeminiGenerator {
    client: GeminiClient,
}

impl GeminiGenerator {
    pub(crate) fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecipeGenerator for GeminiGenerator {
    #[tracing::instrument(skip_all, fields(ingredients = request.ingredients.len()), err)]
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedRecipe, ProviderError> {
        let text = self.client.generate_content(request.prompt()).await?;

        Ok(GeneratedRecipe { text })
    }
}
