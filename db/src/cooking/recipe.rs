use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::choices::{Cuisine, DietaryRestriction, Difficulty};
use super::ingredients::{quantity_fits, round_quantity, Ingredient, NewIngredient};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub recipe_id: Uuid,
    pub title: String,
    pub description: String,
    pub instructions: String,
    #[sqlx(try_from = "String")]
    pub dietary_restrictions: DietaryRestriction,
    #[sqlx(try_from = "String")]
    pub cuisine: Cuisine,
    #[sqlx(try_from = "String")]
    pub difficulty: Difficulty,
    pub prep_time: i32, // minutes
    pub cook_time: i32, // minutes
    pub servings: i32,
    pub nutritional_info: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub dietary_restrictions: DietaryRestriction,
    pub cuisine: Cuisine,
    pub difficulty: Difficulty,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub nutritional_info: Option<serde_json::Value>,
}

/// Attribute patch for [`Recipe::update`]. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct RecipePatch {
    pub instructions: Option<String>,
    pub nutritional_info: Option<serde_json::Value>,
    pub servings: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeasureError {
    #[error("servings must be a positive integer, got {0}")]
    InvalidServings(i32),
    #[error("{ingredient} would exceed the largest storable quantity at {servings} servings")]
    QuantityOutOfRange { servings: i32, ingredient: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeWithIngredients {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub ingredients: Vec<Ingredient>,
}

#[derive(sqlx::FromRow)]
struct LinkedIngredient {
    recipe_id: Uuid,
    #[sqlx(flatten)]
    ingredient: Ingredient,
}

const RECIPE_COLUMNS: &str = "
    recipe_id,
    title,
    description,
    instructions,
    dietary_restrictions,
    cuisine,
    difficulty,
    prep_time,
    cook_time,
    servings,
    nutritional_info,
    created_at,
    updated_at
";

impl Recipe {
    #[tracing::instrument(skip(executor, new), fields(title = %new.title), err)]
    pub async fn create(executor: impl PgExecutor<'_>, new: &NewRecipe) -> Result<Self> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "
            INSERT INTO recipes (
                title, description, instructions, dietary_restrictions,
                cuisine, difficulty, prep_time, cook_time, servings, nutritional_info
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {RECIPE_COLUMNS}
            "
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.instructions)
        .bind(new.dietary_restrictions.as_str())
        .bind(new.cuisine.as_str())
        .bind(new.difficulty.as_str())
        .bind(new.prep_time)
        .bind(new.cook_time)
        .bind(new.servings)
        .bind(&new.nutritional_info)
        .fetch_one(executor)
        .await?;

        Ok(recipe)
    }

    /// Inserts the recipe and links it to its ingredients in one transaction.
    /// Ingredients are get-or-created, so shared rows are reused.
    #[tracing::instrument(
        skip_all,
        fields(title = %new.title, ingredients = ingredients.len()),
        err
    )]
    pub async fn create_with_ingredients(
        pool: &PgPool,
        new: &NewRecipe,
        ingredients: &[NewIngredient],
    ) -> Result<RecipeWithIngredients> {
        let mut tx = pool.begin().await?;

        let mut linked = Ingredient::get_or_create_all(&mut *tx, ingredients).await?;
        sort_ingredients(&mut linked);

        let recipe = Self::create(&mut *tx, new).await?;
        for ingredient in &linked {
            Self::link_ingredient(&mut *tx, recipe.recipe_id, ingredient.ingredient_id).await?;
        }

        tx.commit().await?;

        Ok(RecipeWithIngredients {
            recipe,
            ingredients: linked,
        })
    }

    pub async fn link_ingredient(
        executor: impl PgExecutor<'_>,
        recipe_id: Uuid,
        ingredient_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn unlink_all_ingredients(
        executor: impl PgExecutor<'_>,
        recipe_id: Uuid,
    ) -> Result<()> {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Makes `ingredient_ids` the complete ingredient list of the recipe.
    pub async fn replace_ingredients(
        conn: &mut PgConnection,
        recipe_id: Uuid,
        ingredient_ids: &[Uuid],
    ) -> Result<()> {
        Self::unlink_all_ingredients(&mut *conn, recipe_id).await?;

        sqlx::query(
            "
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(recipe_id)
        .bind(ingredient_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(
        executor: impl PgExecutor<'_>,
        recipe_id: Uuid,
    ) -> Result<Option<Self>> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE recipe_id = $1"
        ))
        .bind(recipe_id)
        .fetch_optional(executor)
        .await?;

        Ok(recipe)
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>> {
        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY created_at, recipe_id"
        ))
        .fetch_all(pool)
        .await?;

        Ok(recipes)
    }

    #[tracing::instrument(skip(executor, patch), err)]
    pub async fn update(
        &self,
        executor: impl PgExecutor<'_>,
        patch: RecipePatch,
    ) -> Result<Self> {
        let updated = sqlx::query_as::<_, Recipe>(&format!(
            "
            UPDATE recipes
            SET instructions = COALESCE($2, instructions),
                nutritional_info = COALESCE($3, nutritional_info),
                servings = COALESCE($4, servings),
                updated_at = NOW()
            WHERE recipe_id = $1
            RETURNING {RECIPE_COLUMNS}
            "
        ))
        .bind(self.recipe_id)
        .bind(patch.instructions)
        .bind(patch.nutritional_info)
        .bind(patch.servings)
        .fetch_one(executor)
        .await?;

        Ok(updated)
    }

    pub async fn get_full(pool: &PgPool, recipe_id: Uuid) -> Result<Option<RecipeWithIngredients>> {
        let Some(recipe) = Self::get_by_id(pool, recipe_id).await? else {
            return Ok(None);
        };

        let ingredients = Ingredient::list_for_recipe(pool, recipe_id).await?;

        Ok(Some(RecipeWithIngredients {
            recipe,
            ingredients,
        }))
    }

    /// Every recipe with its nested ingredients, fetched in two queries.
    pub async fn list_all_full(pool: &PgPool) -> Result<Vec<RecipeWithIngredients>> {
        let recipes = Self::list_all(pool).await?;
        let recipe_ids: Vec<Uuid> = recipes.iter().map(|r| r.recipe_id).collect();

        let links = sqlx::query_as::<_, LinkedIngredient>(
            "
            SELECT
                ri.recipe_id,
                i.ingredient_id,
                i.name,
                i.quantity,
                i.unit,
                i.allergens,
                i.cost_per_unit,
                i.created_at,
                i.updated_at
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.ingredient_id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY i.name, i.ingredient_id
            ",
        )
        .bind(&recipe_ids)
        .fetch_all(pool)
        .await?;

        let mut by_recipe: HashMap<Uuid, Vec<Ingredient>> = HashMap::new();
        for link in links {
            by_recipe
                .entry(link.recipe_id)
                .or_default()
                .push(link.ingredient);
        }

        Ok(recipes
            .into_iter()
            .map(|recipe| RecipeWithIngredients {
                ingredients: by_recipe.remove(&recipe.recipe_id).unwrap_or_default(),
                recipe,
            })
            .collect())
    }
}

/// Same order the read queries return ingredients in.
fn sort_ingredients(ingredients: &mut [Ingredient]) {
    ingredients.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.ingredient_id.cmp(&b.ingredient_id))
    });
}

impl RecipeWithIngredients {
    /// Rescales every ingredient quantity by `new_servings / servings`, rounded
    /// half-even to two decimal places, and sets `servings` to `new_servings`.
    ///
    /// This only touches the in-memory copy; see [`Self::save_measurement`].
    /// Nothing changes when a scaled quantity would not fit in the quantity
    /// column.
    pub fn measure_ingredients(&mut self, new_servings: i32) -> Result<(), MeasureError> {
        if new_servings <= 0 {
            return Err(MeasureError::InvalidServings(new_servings));
        }
        let current = BigDecimal::from(self.recipe.servings);

        let mut scaled = Vec::with_capacity(self.ingredients.len());
        for ingredient in &self.ingredients {
            let quantity = &ingredient.quantity * BigDecimal::from(new_servings) / &current;
            if !quantity_fits(&quantity) {
                return Err(MeasureError::QuantityOutOfRange {
                    servings: new_servings,
                    ingredient: ingredient.name.clone(),
                });
            }
            scaled.push(round_quantity(&quantity));
        }

        for (ingredient, quantity) in self.ingredients.iter_mut().zip(scaled) {
            ingredient.quantity = quantity;
        }

        self.recipe.servings = new_servings;

        Ok(())
    }

    /// Persists a measured recipe. Ingredient rows are shared between recipes,
    /// so instead of rewriting them the recipe is relinked to rows for the new
    /// quantities.
    #[tracing::instrument(skip_all, fields(recipe_id = %self.recipe.recipe_id), err)]
    pub async fn save_measurement(self, pool: &PgPool) -> Result<Self> {
        let mut tx = pool.begin().await?;

        let scaled: Vec<NewIngredient> = self
            .ingredients
            .iter()
            .map(|i| NewIngredient::from_existing(i, &i.quantity))
            .collect();
        let mut ingredients = Ingredient::get_or_create_all(&mut *tx, &scaled).await?;
        sort_ingredients(&mut ingredients);

        let ingredient_ids: Vec<Uuid> = ingredients.iter().map(|i| i.ingredient_id).collect();
        Recipe::replace_ingredients(&mut *tx, self.recipe.recipe_id, &ingredient_ids).await?;

        let recipe = self
            .recipe
            .update(
                &mut *tx,
                RecipePatch {
                    servings: Some(self.recipe.servings),
                    ..RecipePatch::default()
                },
            )
            .await?;

        tx.commit().await?;

        Ok(Self {
            recipe,
            ingredients,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn new_recipe(title: &str, servings: i32) -> NewRecipe {
        NewRecipe {
            title: title.to_string(),
            description: "Delicious tomato pasta".to_string(),
            instructions: String::new(),
            dietary_restrictions: DietaryRestriction::Vegan,
            cuisine: Cuisine::Italian,
            difficulty: Difficulty::Easy,
            prep_time: 10,
            cook_time: 20,
            servings,
            nutritional_info: None,
        }
    }

    fn tomato_and_pasta() -> Vec<NewIngredient> {
        vec![
            NewIngredient::normalized("Tomato", &dec("2"), Some("pieces")),
            NewIngredient::normalized("Pasta", &dec("200"), Some("grams")),
        ]
    }

    fn ingredient(name: &str, quantity: &str) -> Ingredient {
        Ingredient {
            ingredient_id: Uuid::new_v4(),
            name: name.to_string(),
            quantity: dec(quantity),
            unit: None,
            allergens: None,
            cost_per_unit: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn in_memory(servings: i32, ingredients: Vec<Ingredient>) -> RecipeWithIngredients {
        let new = new_recipe("Sample", servings);
        RecipeWithIngredients {
            recipe: Recipe {
                recipe_id: Uuid::new_v4(),
                title: new.title,
                description: new.description,
                instructions: new.instructions,
                dietary_restrictions: new.dietary_restrictions,
                cuisine: new.cuisine,
                difficulty: new.difficulty,
                prep_time: new.prep_time,
                cook_time: new.cook_time,
                servings: new.servings,
                nutritional_info: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            ingredients,
        }
    }

    #[test]
    fn measure_ingredients_doubles_quantities() {
        let mut recipe = in_memory(2, vec![ingredient("tomato", "2")]);

        recipe.measure_ingredients(4).unwrap();

        assert_eq!(recipe.recipe.servings, 4);
        assert_eq!(recipe.ingredients[0].quantity.to_string(), "4.00");
    }

    #[test]
    fn measure_ingredients_rounds_to_two_places() {
        let mut recipe = in_memory(
            3,
            vec![ingredient("flour", "1"), ingredient("milk", "0.25")],
        );

        recipe.measure_ingredients(1).unwrap();

        assert_eq!(recipe.ingredients[0].quantity.to_string(), "0.33");
        assert_eq!(recipe.ingredients[1].quantity.to_string(), "0.08");
    }

    #[test]
    fn measure_ingredients_rejects_non_positive_servings() {
        let mut recipe = in_memory(2, vec![ingredient("tomato", "2")]);

        assert_eq!(
            recipe.measure_ingredients(0),
            Err(MeasureError::InvalidServings(0))
        );
        assert_eq!(recipe.recipe.servings, 2);
        assert_eq!(recipe.ingredients[0].quantity, dec("2"));
    }

    #[test]
    fn measure_ingredients_rejects_quantities_too_large_to_store() {
        let mut recipe = in_memory(2, vec![ingredient("salt", "1"), ingredient("pasta", "200")]);

        assert_eq!(
            recipe.measure_ingredients(2_000_000),
            Err(MeasureError::QuantityOutOfRange {
                servings: 2_000_000,
                ingredient: "pasta".to_string(),
            })
        );
        assert_eq!(recipe.recipe.servings, 2);
        assert_eq!(recipe.ingredients[0].quantity, dec("1"));

        recipe.measure_ingredients(999_999).unwrap();
        assert_eq!(recipe.ingredients[1].quantity.to_string(), "99999900.00");
    }

    async fn create(
        pool: &PgPool,
        title: &str,
        ingredients: &[NewIngredient],
    ) -> RecipeWithIngredients {
        Recipe::create_with_ingredients(pool, &new_recipe(title, 2), ingredients)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn create_with_ingredients_shares_ingredient_rows(pool: PgPool) {
        let first = create(&pool, "Tomato Pasta", &tomato_and_pasta()).await;
        let second = create(&pool, "Pasta Again", &tomato_and_pasta()).await;

        assert_eq!(Ingredient::count(&pool).await.unwrap(), 2);

        let ids = |r: &RecipeWithIngredients| -> Vec<Uuid> {
            r.ingredients.iter().map(|i| i.ingredient_id).collect()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[sqlx::test]
    async fn concurrent_creates_sharing_ingredients_in_any_order_all_succeed(pool: PgPool) {
        let a = NewIngredient::normalized("anise", &dec("1"), None);
        let b = NewIngredient::normalized("basil", &dec("1"), None);
        let c = NewIngredient::normalized("chili", &dec("1"), Some("piece"));
        Ingredient::get_or_create(&pool, &a).await.unwrap();
        Ingredient::get_or_create(&pool, &b).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..20 {
            let pool = pool.clone();
            let ingredients = if n % 2 == 0 {
                vec![a.clone(), b.clone(), c.clone()]
            } else {
                vec![c.clone(), b.clone(), a.clone()]
            };
            tasks.spawn(async move {
                let title = format!("Recipe {n}");
                Recipe::create_with_ingredients(&pool, &new_recipe(&title, 2), &ingredients).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let created = joined.unwrap().unwrap();
            assert_eq!(created.ingredients.len(), 3);
        }

        assert_eq!(Ingredient::count(&pool).await.unwrap(), 3);
        let all = Recipe::list_all_full(&pool).await.unwrap();
        assert_eq!(all.len(), 20);
        let ids = |r: &RecipeWithIngredients| -> Vec<Uuid> {
            r.ingredients.iter().map(|i| i.ingredient_id).collect()
        };
        assert!(all.iter().all(|r| ids(r) == ids(&all[0])));
    }

    #[sqlx::test]
    async fn duplicate_ingredients_in_one_recipe_link_once(pool: PgPool) {
        let mut ingredients = tomato_and_pasta();
        ingredients.push(NewIngredient::normalized("TOMATO", &dec("2.00"), Some("Pieces")));

        let created = create(&pool, "Tomato Pasta", &ingredients).await;

        assert_eq!(created.ingredients.len(), 2);
        let fetched = Recipe::get_full(&pool, created.recipe.recipe_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.ingredients.len(), 2);
    }

    #[sqlx::test]
    async fn list_all_full_nests_ingredients(pool: PgPool) {
        create(&pool, "Tomato Pasta", &tomato_and_pasta()).await;
        create(&pool, "Plain", &[]).await;

        let all = Recipe::list_all_full(&pool).await.unwrap();

        assert_eq!(all.len(), 2);
        let pasta = all.iter().find(|r| r.recipe.title == "Tomato Pasta").unwrap();
        assert_eq!(pasta.ingredients.len(), 2);
        let plain = all.iter().find(|r| r.recipe.title == "Plain").unwrap();
        assert!(plain.ingredients.is_empty());
    }

    #[sqlx::test]
    async fn get_full_returns_none_for_unknown_id(pool: PgPool) {
        assert!(Recipe::get_full(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn update_patches_only_given_attributes(pool: PgPool) {
        let created = Recipe::create(&pool, &new_recipe("Tomato Pasta", 2))
            .await
            .unwrap();

        let updated = created
            .update(
                &pool,
                RecipePatch {
                    instructions: Some("Boil the pasta.".to_string()),
                    nutritional_info: Some(serde_json::json!({ "foods": [] })),
                    servings: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.instructions, "Boil the pasta.");
        assert_eq!(
            updated.nutritional_info,
            Some(serde_json::json!({ "foods": [] }))
        );
        assert_eq!(updated.servings, 2);
        assert_eq!(updated.title, "Tomato Pasta");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[sqlx::test]
    async fn save_measurement_relinks_without_touching_shared_rows(pool: PgPool) {
        let first = create(&pool, "Tomato Pasta", &tomato_and_pasta()).await;
        let second = create(&pool, "Other", &tomato_and_pasta()).await;

        let mut measured = Recipe::get_full(&pool, first.recipe.recipe_id)
            .await
            .unwrap()
            .unwrap();
        measured.measure_ingredients(4).unwrap();
        let saved = measured.save_measurement(&pool).await.unwrap();

        assert_eq!(saved.recipe.servings, 4);
        let tomato = saved.ingredients.iter().find(|i| i.name == "tomato").unwrap();
        assert_eq!(tomato.quantity, dec("4.00"));

        let untouched = Recipe::get_full(&pool, second.recipe.recipe_id)
            .await
            .unwrap()
            .unwrap();
        let tomato = untouched.ingredients.iter().find(|i| i.name == "tomato").unwrap();
        assert_eq!(tomato.quantity, dec("2.00"));
        assert_eq!(untouched.recipe.servings, 2);

        assert_eq!(Ingredient::count(&pool).await.unwrap(), 4);
    }
}
