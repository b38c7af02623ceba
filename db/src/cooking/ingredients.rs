use bigdecimal::{BigDecimal, RoundingMode, Zero};
use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

/// Quantities are stored as NUMERIC(10, 2).
pub const QUANTITY_SCALE: i64 = 2;

/// Integer digits a quantity column can hold.
pub const QUANTITY_INTEGER_DIGITS: u32 = 8;

pub fn round_quantity(quantity: &BigDecimal) -> BigDecimal {
    quantity.with_scale_round(QUANTITY_SCALE, RoundingMode::HalfEven)
}

/// Whether a rounded quantity fits in the quantity column.
pub fn quantity_fits(quantity: &BigDecimal) -> bool {
    round_quantity(quantity).abs() < BigDecimal::from(10_u64.pow(QUANTITY_INTEGER_DIGITS))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ingredient {
    pub ingredient_id: Uuid,
    pub name: String,
    pub quantity: BigDecimal,
    pub unit: Option<String>,
    pub allergens: Option<String>,
    pub cost_per_unit: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An ingredient in canonical form, ready to be stored.
///
/// Name and unit are trimmed and lowercased, a blank unit becomes `None` and
/// the quantity is rounded to two decimal places. `(name, unit, quantity)` in
/// this form is the ingredient's identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIngredient {
    pub name: String,
    pub quantity: BigDecimal,
    pub unit: Option<String>,
    pub allergens: Option<String>,
    pub cost_per_unit: BigDecimal,
}

impl NewIngredient {
    pub fn normalized(name: &str, quantity: &BigDecimal, unit: Option<&str>) -> Self {
        let unit = unit
            .map(|u| u.trim().to_lowercase())
            .filter(|u| !u.is_empty());

        Self {
            name: name.trim().to_lowercase(),
            quantity: round_quantity(quantity),
            unit,
            allergens: None,
            cost_per_unit: BigDecimal::zero(),
        }
    }

    #[must_use]
    pub fn with_allergens(mut self, allergens: Option<String>) -> Self {
        self.allergens = allergens
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        self
    }

    #[must_use]
    pub fn with_cost_per_unit(mut self, cost_per_unit: Option<BigDecimal>) -> Self {
        self.cost_per_unit = cost_per_unit.map_or_else(BigDecimal::zero, |c| round_quantity(&c));
        self
    }

    /// `(name, unit, quantity)` with a missing unit as `""`, as the unique index
    /// compares them.
    pub fn identity(&self) -> (&str, &str, &BigDecimal) {
        (
            &self.name,
            self.unit.as_deref().unwrap_or_default(),
            &self.quantity,
        )
    }

    /// The same ingredient at a different quantity, keeping its other attributes.
    pub fn from_existing(ingredient: &Ingredient, quantity: &BigDecimal) -> Self {
        Self::normalized(&ingredient.name, quantity, ingredient.unit.as_deref())
            .with_allergens(ingredient.allergens.clone())
            .with_cost_per_unit(ingredient.cost_per_unit.clone())
    }
}

impl Ingredient {
    #[tracing::instrument(skip(executor), err)]
    pub async fn create(executor: impl PgExecutor<'_>, new: &NewIngredient) -> Result<Self> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "
            INSERT INTO ingredients (name, quantity, unit, allergens, cost_per_unit)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING
                ingredient_id,
                name,
                quantity,
                unit,
                allergens,
                cost_per_unit,
                created_at,
                updated_at
            ",
        )
        .bind(&new.name)
        .bind(&new.quantity)
        .bind(&new.unit)
        .bind(&new.allergens)
        .bind(&new.cost_per_unit)
        .fetch_one(executor)
        .await?;

        Ok(ingredient)
    }

    /// Returns the stored ingredient with the same canonical identity, inserting
    /// it first if there is none. Attributes of an existing row are left alone.
    #[tracing::instrument(skip(executor), err)]
    pub async fn get_or_create(
        executor: impl PgExecutor<'_>,
        new: &NewIngredient,
    ) -> Result<Self> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "
            INSERT INTO ingredients (name, quantity, unit, allergens, cost_per_unit)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name, (COALESCE(unit, '')), quantity)
            DO UPDATE SET updated_at = ingredients.updated_at
            RETURNING
                ingredient_id,
                name,
                quantity,
                unit,
                allergens,
                cost_per_unit,
                created_at,
                updated_at
            ",
        )
        .bind(&new.name)
        .bind(&new.quantity)
        .bind(&new.unit)
        .bind(&new.allergens)
        .bind(&new.cost_per_unit)
        .fetch_one(executor)
        .await?;

        Ok(ingredient)
    }

    /// Get-or-creates every ingredient and returns one row per distinct
    /// identity, in identity order.
    ///
    /// Each upsert locks its row until the transaction commits, so rows are
    /// always visited in identity order to keep concurrent transactions from
    /// deadlocking on each other.
    #[tracing::instrument(skip_all, fields(ingredients = ingredients.len()), err)]
    pub async fn get_or_create_all(
        conn: &mut PgConnection,
        ingredients: &[NewIngredient],
    ) -> Result<Vec<Self>> {
        let mut ordered: Vec<&NewIngredient> = ingredients.iter().collect();
        ordered.sort_by(|a, b| a.identity().cmp(&b.identity()));
        ordered.dedup_by(|a, b| a.identity() == b.identity());

        let mut stored = Vec::with_capacity(ordered.len());
        for new in ordered {
            stored.push(Self::get_or_create(&mut *conn, new).await?);
        }

        Ok(stored)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let ingredients = sqlx::query_as::<_, Ingredient>(
            "
            SELECT
                ingredient_id,
                name,
                quantity,
                unit,
                allergens,
                cost_per_unit,
                created_at,
                updated_at
            FROM ingredients
            ORDER BY name, quantity
            ",
        )
        .fetch_all(pool)
        .await?;

        Ok(ingredients)
    }

    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ingredients")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn list_for_recipe(
        executor: impl PgExecutor<'_>,
        recipe_id: Uuid,
    ) -> Result<Vec<Self>> {
        let ingredients = sqlx::query_as::<_, Ingredient>(
            "
            SELECT
                i.ingredient_id,
                i.name,
                i.quantity,
                i.unit,
                i.allergens,
                i.cost_per_unit,
                i.created_at,
                i.updated_at
            FROM ingredients i
            JOIN recipe_ingredients ri ON ri.ingredient_id = i.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY i.name, i.ingredient_id
            ",
        )
        .bind(recipe_id)
        .fetch_all(executor)
        .await?;

        Ok(ingredients)
    }
}
