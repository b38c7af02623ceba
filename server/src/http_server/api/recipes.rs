use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use color_eyre::eyre::{eyre, Context};
use db::cooking::{Recipe, RecipeWithIngredients};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    http_server::{errors::WithStatus as _, ResponseResult},
    recipes::{
        self,
        validation::{measure_error, measure_servings},
        GenerateRecipeError, GenerateRecipeRequest, ValidationErrors,
    },
    AppState,
};

const RECIPE_NOT_FOUND: &str = "Recipe not found";

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ValidationErrors> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ValidationErrors::single("non_field_errors", rejection.body_text()))
}

/// Ids that aren't UUIDs can't name a recipe, so they 404 like unknown ones.
async fn find_recipe(state: &AppState, id: &str) -> ResponseResult<RecipeWithIngredients> {
    let recipe_id = Uuid::parse_str(id)
        .map_err(|_| eyre!(RECIPE_NOT_FOUND))
        .with_status(StatusCode::NOT_FOUND)?;

    let recipe = Recipe::get_full(&state.db, recipe_id)
        .await
        .context("Failed to fetch recipe")
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or_else(|| eyre!(RECIPE_NOT_FOUND))
        .with_status(StatusCode::NOT_FOUND)?;

    Ok(recipe)
}

#[axum_macros::debug_handler]
pub async fn list_recipes(State(state): State<AppState>) -> ResponseResult<impl IntoResponse> {
    let recipes = Recipe::list_all_full(&state.db)
        .await
        .context("Failed to fetch recipes")
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(recipes))
}

#[axum_macros::debug_handler]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ResponseResult<impl IntoResponse> {
    let recipe = find_recipe(&state, &id).await?;

    Ok(Json(recipe))
}

#[axum_macros::debug_handler]
pub async fn generate_recipe(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let request = match json_body(payload).and_then(|v| GenerateRecipeRequest::from_json(&v)) {
        Ok(request) => request,
        Err(errors) => return Ok(errors.into_response()),
    };

    let recipe = match recipes::generate_recipe(&state, request).await {
        Ok(recipe) => recipe,
        Err(err @ GenerateRecipeError::Generation(_)) => {
            return Err(eyre!(err.to_string())).with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(GenerateRecipeError::Persistence(report)) => {
            return Err(report.wrap_err("Failed to save generated recipe"))
                .with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Ok((StatusCode::CREATED, Json(recipe)).into_response())
}

#[axum_macros::debug_handler]
pub async fn measure_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ResponseResult {
    let servings = match json_body(payload).and_then(|v| measure_servings(&v)) {
        Ok(servings) => servings,
        Err(errors) => return Ok(errors.into_response()),
    };

    let mut recipe = find_recipe(&state, &id).await?;
    if let Err(err) = recipe.measure_ingredients(servings) {
        return Ok(measure_error(&err).into_response());
    }

    let recipe = recipe
        .save_measurement(&state.db)
        .await
        .context("Failed to save measured recipe")
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(recipe).into_response())
}
