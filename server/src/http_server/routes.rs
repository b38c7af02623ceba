use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::api;
use crate::AppState;

pub(crate) fn make_router() -> Router<AppState> {
    Router::new()
        .route("/_health", get(|| async { "OK" }))
        .route("/recipes/", get(api::recipes::list_recipes))
        .route("/recipes/generate/", post(api::recipes::generate_recipe))
        .route("/recipes/{id}/", get(api::recipes::get_recipe))
        .route("/recipes/{id}/measure/", post(api::recipes::measure_recipe))
        .route("/ingredients/", get(api::ingredients::list_ingredients))
        .fallback(fallback)
}

async fn fallback(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("No route for {}", uri.path()) })),
    )
}
