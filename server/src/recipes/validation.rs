use std::collections::BTreeMap;
use std::str::FromStr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::{BigDecimal, Signed, ToPrimitive};
use db::cooking::{
    Cuisine, DietaryRestriction, Difficulty, MeasureError, NewIngredient, UnknownChoice,
};
use serde::Serialize;
use serde_json::{Map, Value};

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const INVALID_STRING: &str = "Not a valid string.";
const INVALID_INTEGER: &str = "A valid integer is required.";
const INVALID_NUMBER: &str = "A valid number is required.";
const EMPTY_LIST: &str = "This list may not be empty.";
const NULL_CHARACTERS: &str = "Null characters are not allowed.";
const AT_LEAST_ONE: &str = "Ensure this value is greater than or equal to 1.";

const TITLE_MAX_LENGTH: usize = 100;
const NAME_MAX_LENGTH: usize = 100;
const UNIT_MAX_LENGTH: usize = 50;
const ALLERGENS_MAX_LENGTH: usize = 200;
const DECIMAL_PLACES: i64 = 2;
const MAX_DIGITS: i64 = 10;

/// Field name → error detail, rendered as a `400` JSON body.
///
/// Scalar fields map to a list of messages. `ingredients` maps either to a list
/// of messages or to one error object per submitted item, `{}` for valid ones.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct ValidationErrors(BTreeMap<String, Value>);

impl ValidationErrors {
    pub(crate) fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    fn add(&mut self, field: &str, message: impl Into<String>) {
        let entry = self
            .0
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(vec![]));
        if let Value::Array(messages) = entry {
            messages.push(Value::String(message.into()));
        }
    }

    fn set(&mut self, field: &str, detail: Value) {
        self.0.insert(field.to_string(), detail);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GenerateRecipeRequest {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<NewIngredient>,
    pub cuisine: Cuisine,
    pub dietary_restrictions: DietaryRestriction,
    pub difficulty: Difficulty,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub allergens: Option<String>,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn as_object<'a>(
    value: &'a Value,
    errors: &mut ValidationErrors,
) -> Option<&'a Map<String, Value>> {
    if let Value::Object(map) = value {
        Some(map)
    } else {
        errors.add(
            "non_field_errors",
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                type_name(value)
            ),
        );
        None
    }
}

/// `Ok(None)` when the key is absent or null and the field is optional.
fn string_field(
    obj: &Map<String, Value>,
    field: &str,
    required: bool,
    max_length: Option<usize>,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let value = match obj.get(field) {
        None if required => {
            errors.add(field, REQUIRED);
            return None;
        }
        Some(Value::Null) if required => {
            errors.add(field, NOT_NULL);
            return None;
        }
        None | Some(Value::Null) => return None,
        Some(value) => value,
    };

    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => {
            errors.add(field, INVALID_STRING);
            return None;
        }
    };

    if text.contains('\0') {
        errors.add(field, NULL_CHARACTERS);
        return None;
    }

    if text.is_empty() {
        if required {
            errors.add(field, NOT_BLANK);
        }
        return None;
    }

    if let Some(max) = max_length {
        if text.chars().count() > max {
            errors.add(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
            return None;
        }
    }

    Some(text)
}

fn choice_field<T>(
    obj: &Map<String, Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<T>
where
    T: FromStr<Err = UnknownChoice>,
{
    match obj.get(field) {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(Value::Null) => {
            errors.add(field, NOT_NULL);
            None
        }
        Some(Value::String(s)) => match s.parse::<T>() {
            Ok(choice) => Some(choice),
            Err(e) => {
                errors.add(field, e.to_string());
                None
            }
        },
        Some(other) => {
            errors.add(field, format!("\"{other}\" is not a valid choice."));
            None
        }
    }
}

fn positive_int_field(
    obj: &Map<String, Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<i32> {
    let parsed = match obj.get(field) {
        None => {
            errors.add(field, REQUIRED);
            return None;
        }
        Some(Value::Null) => {
            errors.add(field, NOT_NULL);
            return None;
        }
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            BigDecimal::from_str(&n.to_string())
                .ok()
                .filter(BigDecimal::is_integer)
                .and_then(|d| d.to_i64())
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    let Some(value) = parsed else {
        errors.add(field, INVALID_INTEGER);
        return None;
    };

    if value < 1 {
        errors.add(field, AT_LEAST_ONE);
        return None;
    }

    match i32::try_from(value) {
        Ok(v) => Some(v),
        Err(_) => {
            errors.add(
                field,
                format!("Ensure this value is less than or equal to {}.", i32::MAX),
            );
            None
        }
    }
}

fn decimal_field(
    obj: &Map<String, Value>,
    field: &str,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<BigDecimal> {
    let text = match obj.get(field) {
        None if required => {
            errors.add(field, REQUIRED);
            return None;
        }
        Some(Value::Null) if required => {
            errors.add(field, NOT_NULL);
            return None;
        }
        None | Some(Value::Null) => return None,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => {
            errors.add(field, INVALID_NUMBER);
            return None;
        }
    };

    let Ok(value) = BigDecimal::from_str(&text) else {
        errors.add(field, INVALID_NUMBER);
        return None;
    };

    if value.is_negative() {
        errors.add(field, "Ensure this value is greater than or equal to 0.");
        return None;
    }

    let normalized = value.normalized();
    let (digits, scale) = normalized.as_bigint_and_exponent();
    let decimal_places = scale.max(0);
    let total_digits = i64::try_from(digits.magnitude().to_string().len()).unwrap_or(i64::MAX)
        + (-scale).max(0);

    if decimal_places > DECIMAL_PLACES {
        errors.add(
            field,
            format!("Ensure that there are no more than {DECIMAL_PLACES} decimal places."),
        );
        return None;
    }

    if total_digits - decimal_places > MAX_DIGITS - DECIMAL_PLACES {
        errors.add(
            field,
            format!(
                "Ensure that there are no more than {} digits before the decimal point.",
                MAX_DIGITS - DECIMAL_PLACES
            ),
        );
        return None;
    }

    Some(value)
}

fn ingredient_item(value: &Value) -> Result<NewIngredient, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let Some(obj) = as_object(value, &mut errors) else {
        return Err(errors);
    };

    let name = string_field(obj, "name", true, Some(NAME_MAX_LENGTH), &mut errors);
    let quantity = decimal_field(obj, "quantity", true, &mut errors);
    let unit = string_field(obj, "unit", false, Some(UNIT_MAX_LENGTH), &mut errors);
    let allergens = string_field(obj, "allergens", false, Some(ALLERGENS_MAX_LENGTH), &mut errors);
    let cost_per_unit = decimal_field(obj, "cost_per_unit", false, &mut errors);

    match (name, quantity) {
        (Some(name), Some(quantity)) if errors.is_empty() => {
            Ok(NewIngredient::normalized(&name, &quantity, unit.as_deref())
                .with_allergens(allergens)
                .with_cost_per_unit(cost_per_unit))
        }
        _ => Err(errors),
    }
}

fn ingredients_field(
    obj: &Map<String, Value>,
    errors: &mut ValidationErrors,
) -> Option<Vec<NewIngredient>> {
    let items = match obj.get("ingredients") {
        None => {
            errors.add("ingredients", REQUIRED);
            return None;
        }
        Some(Value::Null) => {
            errors.add("ingredients", NOT_NULL);
            return None;
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            errors.add(
                "ingredients",
                format!(
                    "Expected a list of items but got type \"{}\".",
                    type_name(other)
                ),
            );
            return None;
        }
    };

    if items.is_empty() {
        errors.add("ingredients", EMPTY_LIST);
        return None;
    }

    let mut ingredients = Vec::with_capacity(items.len());
    let mut item_errors = Vec::with_capacity(items.len());
    let mut any_invalid = false;

    for item in items {
        match ingredient_item(item) {
            Ok(ingredient) => {
                ingredients.push(ingredient);
                item_errors.push(Value::Object(Map::new()));
            }
            Err(e) => {
                any_invalid = true;
                item_errors.push(serde_json::to_value(e).unwrap_or_default());
            }
        }
    }

    if any_invalid {
        errors.set("ingredients", Value::Array(item_errors));
        return None;
    }

    Some(ingredients)
}

impl GenerateRecipeRequest {
    /// Validates a raw JSON payload, collecting every field error instead of
    /// stopping at the first.
    pub(crate) fn from_json(value: &Value) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let Some(obj) = as_object(value, &mut errors) else {
            return Err(errors);
        };

        let title = string_field(obj, "title", true, Some(TITLE_MAX_LENGTH), &mut errors);
        let description = string_field(obj, "description", true, None, &mut errors);
        let ingredients = ingredients_field(obj, &mut errors);
        let cuisine = choice_field::<Cuisine>(obj, "cuisine", &mut errors);
        let dietary_restrictions =
            choice_field::<DietaryRestriction>(obj, "dietary_restrictions", &mut errors);
        let difficulty = choice_field::<Difficulty>(obj, "difficulty", &mut errors);
        let prep_time = positive_int_field(obj, "prep_time", &mut errors);
        let cook_time = positive_int_field(obj, "cook_time", &mut errors);
        let servings = positive_int_field(obj, "servings", &mut errors);
        let allergens = string_field(obj, "allergens", false, None, &mut errors);

        match (
            title,
            description,
            ingredients,
            cuisine,
            dietary_restrictions,
            difficulty,
            prep_time,
            cook_time,
            servings,
        ) {
            (
                Some(title),
                Some(description),
                Some(ingredients),
                Some(cuisine),
                Some(dietary_restrictions),
                Some(difficulty),
                Some(prep_time),
                Some(cook_time),
                Some(servings),
            ) if errors.is_empty() => Ok(Self {
                title,
                description,
                ingredients,
                cuisine,
                dietary_restrictions,
                difficulty,
                prep_time,
                cook_time,
                servings,
                allergens,
            }),
            _ => Err(errors),
        }
    }
}

/// Validates the `{"servings": n}` body of a measure request.
pub(crate) fn measure_servings(value: &Value) -> Result<i32, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let Some(obj) = as_object(value, &mut errors) else {
        return Err(errors);
    };

    positive_int_field(obj, "servings", &mut errors).ok_or(errors)
}

/// Reports a measurement the recipe can't take against `servings`.
pub(crate) fn measure_error(err: &MeasureError) -> ValidationErrors {
    let message = match err {
        MeasureError::InvalidServings(_) => AT_LEAST_ONE.to_string(),
        MeasureError::QuantityOutOfRange { ingredient, .. } => format!(
            "Ensure that the scaled quantity of {ingredient} has no more than {} digits before \
             the decimal point.",
            MAX_DIGITS - DECIMAL_PLACES
        ),
    };

    ValidationErrors::single("servings", message)
}
