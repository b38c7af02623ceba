pub mod choices;
pub mod ingredients;
pub mod recipe;

pub use choices::{Cuisine, DietaryRestriction, Difficulty, UnknownChoice};
pub use ingredients::{Ingredient, NewIngredient};
pub use recipe::{MeasureError, NewRecipe, Recipe, RecipePatch, RecipeWithIngredients};
