use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use db::cooking::NewIngredient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt as _;

use crate::{
    providers::{
        GeneratedRecipe, GenerationRequest, NutritionLookup, ProviderError, RecipeGenerator,
    },
    AppState,
};

/// Stands in for Gemini. Records every request it was asked to answer.
#[derive(Debug)]
pub(crate) struct FakeGenerator {
    outcome: Result<String, ProviderError>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub(crate) fn succeeding(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            requests: Mutex::default(),
        }
    }

    pub(crate) fn failing(err: ProviderError) -> Self {
        Self {
            outcome: Err(err),
            requests: Mutex::default(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecipeGenerator for FakeGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedRecipe, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());

        self.outcome
            .clone()
            .map(|text| GeneratedRecipe { text })
    }
}

/// Stands in for Nutritionix.
#[derive(Debug)]
pub(crate) struct FakeNutrition {
    outcome: Result<Value, ProviderError>,
}

impl FakeNutrition {
    pub(crate) fn succeeding(payload: Value) -> Self {
        Self {
            outcome: Ok(payload),
        }
    }

    pub(crate) fn failing(err: ProviderError) -> Self {
        Self { outcome: Err(err) }
    }
}

#[async_trait]
impl NutritionLookup for FakeNutrition {
    async fn lookup(&self, _ingredients: &[NewIngredient]) -> Result<Value, ProviderError> {
        self.outcome.clone()
    }
}

pub(crate) fn test_state(
    pool: PgPool,
    generator: Arc<dyn RecipeGenerator>,
    nutrition: Arc<dyn NutritionLookup>,
) -> AppState {
    AppState {
        db: pool,
        generator,
        nutrition,
    }
}

pub(crate) fn create_test_app(
    pool: PgPool,
    generator: Arc<dyn RecipeGenerator>,
    nutrition: Arc<dyn NutritionLookup>,
) -> Router {
    crate::http_server::app(test_state(pool, generator, nutrition))
}

pub(crate) async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub(crate) async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub(crate) async fn post_json(app: &Router, uri: &str, body: &Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

pub(crate) async fn response_body_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}
