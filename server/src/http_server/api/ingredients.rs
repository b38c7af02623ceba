use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use color_eyre::eyre::Context;
use db::cooking::Ingredient;

use crate::{
    http_server::{errors::WithStatus as _, ResponseResult},
    AppState,
};

#[axum_macros::debug_handler]
pub async fn list_ingredients(State(state): State<AppState>) -> ResponseResult<impl IntoResponse> {
    let ingredients = Ingredient::list(&state.db)
        .await
        .context("Failed to fetch ingredients")
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(ingredients))
}
