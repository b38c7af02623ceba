use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{value}\" is not a valid choice.")]
pub struct UnknownChoice {
    pub value: String,
}

/// Declares a closed set of snake_case choices stored as TEXT.
macro_rules! choices {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownChoice { value: s.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = UnknownChoice;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

choices!(
    DietaryRestriction {
        Vegan => "vegan",
        Vegetarian => "vegetarian",
        GlutenFree => "gluten_free",
        DairyFree => "dairy_free",
        NutFree => "nut_free",
        Halal => "halal",
        Kosher => "kosher",
        Paleo => "paleo",
        Keto => "keto",
        LowCarb => "low_carb",
        HighProtein => "high_protein",
        None => "none",
    }
);

choices!(
    Cuisine {
        Indian => "indian",
        Italian => "italian",
        Mexican => "mexican",
        Chinese => "chinese",
        Japanese => "japanese",
        French => "french",
        Spanish => "spanish",
        Other => "other",
    }
);

choices!(
    Difficulty {
        Easy => "easy",
        Medium => "medium",
        Hard => "hard",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snake_case_choices() {
        assert_eq!(
            "gluten_free".parse::<DietaryRestriction>(),
            Ok(DietaryRestriction::GlutenFree)
        );
        assert_eq!("italian".parse::<Cuisine>(), Ok(Cuisine::Italian));
        assert_eq!("hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
    }

    #[test]
    fn rejects_unknown_choice() {
        let err = "Italian".parse::<Cuisine>().unwrap_err();
        assert_eq!(err.to_string(), "\"Italian\" is not a valid choice.");
    }

    #[test]
    fn display_round_trips_every_variant() {
        for cuisine in Cuisine::ALL {
            assert_eq!(cuisine.to_string().parse::<Cuisine>().unwrap(), *cuisine);
        }
        assert_eq!(DietaryRestriction::ALL.len(), 12);
    }

    #[test]
    fn serializes_as_plain_strings() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}
