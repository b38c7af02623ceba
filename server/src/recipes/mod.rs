use db::cooking::{NewRecipe, Recipe, RecipeWithIngredients};
use tracing::instrument;

use crate::{
    providers::{GenerationRequest, ProviderError},
    AppState,
};

pub(crate) mod validation;

pub(crate) use validation::{GenerateRecipeRequest, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub(crate) enum GenerateRecipeError {
    #[error("{0}")]
    Generation(ProviderError),
    #[error("Failed to save recipe: {0}")]
    Persistence(color_eyre::Report),
}

/// Generates instructions and nutrition data for a validated request and
/// stores the finished recipe.
///
/// Nothing is written until both providers have answered, and the recipe, its
/// ingredients and the links between them are written in one transaction. A
/// generation failure aborts the whole flow; a nutrition failure is recorded as
/// an `{"error": ...}` payload on the recipe.
#[instrument(skip_all, fields(title = %request.title), err)]
pub(crate) async fn generate_recipe(
    state: &AppState,
    request: GenerateRecipeRequest,
) -> Result<RecipeWithIngredients, GenerateRecipeError> {
    let generation_request = GenerationRequest {
        ingredients: request.ingredients.iter().map(|i| i.name.clone()).collect(),
        cuisine: request.cuisine,
        dietary_restrictions: request.dietary_restrictions,
        difficulty: request.difficulty,
        allergens: request.allergens.clone(),
    };

    let generated = state
        .generator
        .generate(&generation_request)
        .await
        .map_err(GenerateRecipeError::Generation)?;

    let nutritional_info = match state.nutrition.lookup(&request.ingredients).await {
        Ok(info) => info,
        Err(err) => {
            tracing::warn!(error = %err, "Nutrition lookup failed, storing the error instead");
            err.to_payload()
        }
    };

    let new_recipe = NewRecipe {
        title: request.title,
        description: request.description,
        instructions: generated.text,
        dietary_restrictions: request.dietary_restrictions,
        cuisine: request.cuisine,
        difficulty: request.difficulty,
        prep_time: request.prep_time,
        cook_time: request.cook_time,
        servings: request.servings,
        nutritional_info: Some(nutritional_info),
    };

    let recipe = Recipe::create_with_ingredients(&state.db, &new_recipe, &request.ingredients)
        .await
        .map_err(GenerateRecipeError::Persistence)?;

    tracing::info!(recipe_id = %recipe.recipe.recipe_id, "Generated recipe");

    Ok(recipe)
}
