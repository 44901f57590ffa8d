//! Mass and length conversion
//!
//! The scale reports mass either in kilograms or pounds and the user profile
//! stores height either in centimetres or inches, depending on the selected
//! [`UnitSystem`]. Conversions are linear:
//!
//! ```text
//! 1 kg = 2.20462 lb
//! 1 in = 2.54 cm
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Pounds per kilogram
pub const POUNDS_PER_KILOGRAM: f64 = 2.20462;

/// Centimetres per inch
pub const CENTIMETERS_PER_INCH: f64 = 2.54;

/// Convert kilograms to pounds
pub fn kg_to_lb(kg: f64) -> f64 {
    kg * POUNDS_PER_KILOGRAM
}

/// Convert pounds to kilograms
pub fn lb_to_kg(lb: f64) -> f64 {
    lb / POUNDS_PER_KILOGRAM
}

/// Convert centimetres to inches
pub fn cm_to_in(cm: f64) -> f64 {
    cm / CENTIMETERS_PER_INCH
}

/// Convert inches to centimetres
pub fn in_to_cm(inches: f64) -> f64 {
    inches * CENTIMETERS_PER_INCH
}

/// A unit that converts linearly to and from a base unit of its dimension
pub trait LinearUnit: Copy + PartialEq {
    /// Express `value` (in `self`) in the base unit
    fn to_base(self, value: f64) -> f64;

    /// Express `value` (in the base unit) in `self`
    fn from_base(self, value: f64) -> f64;
}

/// Convert `value` between two units of the same dimension
///
/// Returns `value` unchanged when `from == to`.
///
/// # Examples
///
/// ```
/// use bodyscale_types::{convert, MassUnit};
///
/// let lb = convert(10.0, MassUnit::Kilogram, MassUnit::Pound);
/// assert!((lb - 22.0462).abs() < 1e-9);
/// assert_eq!(convert(10.0, MassUnit::Pound, MassUnit::Pound), 10.0);
/// ```
pub fn convert<U: LinearUnit>(value: f64, from: U, to: U) -> f64 {
    if from == to {
        return value;
    }
    to.from_base(from.to_base(value))
}

/// Mass unit (base: kilogram)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MassUnit {
    Kilogram,
    Pound,
}

impl MassUnit {
    /// Short display label
    pub fn label(self) -> &'static str {
        match self {
            Self::Kilogram => "kg",
            Self::Pound => "lb",
        }
    }
}

impl LinearUnit for MassUnit {
    fn to_base(self, value: f64) -> f64 {
        match self {
            Self::Kilogram => value,
            Self::Pound => lb_to_kg(value),
        }
    }

    fn from_base(self, value: f64) -> f64 {
        match self {
            Self::Kilogram => value,
            Self::Pound => kg_to_lb(value),
        }
    }
}

/// Length unit (base: centimetre)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthUnit {
    Centimeter,
    Inch,
}

impl LengthUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::Centimeter => "cm",
            Self::Inch => "in",
        }
    }
}

impl LinearUnit for LengthUnit {
    fn to_base(self, value: f64) -> f64 {
        match self {
            Self::Centimeter => value,
            Self::Inch => in_to_cm(value),
        }
    }

    fn from_base(self, value: f64) -> f64 {
        match self {
            Self::Centimeter => value,
            Self::Inch => cm_to_in(value),
        }
    }
}

/// Measurement system selected by the user and reported by the scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Unit used for body mass in this system
    pub fn mass_unit(self) -> MassUnit {
        match self {
            Self::Metric => MassUnit::Kilogram,
            Self::Imperial => MassUnit::Pound,
        }
    }

    /// Unit used for body height in this system
    pub fn length_unit(self) -> LengthUnit {
        match self {
            Self::Metric => LengthUnit::Centimeter,
            Self::Imperial => LengthUnit::Inch,
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "metric"),
            Self::Imperial => write!(f, "imperial"),
        }
    }
}

impl FromStr for UnitSystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metric" | "kg" | "kilogram" | "kilograms" => Ok(Self::Metric),
            "imperial" | "lb" | "lbs" | "pound" | "pounds" => Ok(Self::Imperial),
            _ => Err(Error::UnknownUnitSystem(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_kg_lb_factor() {
        assert!((kg_to_lb(1.0) - 2.20462).abs() < 1e-12);
        assert!((lb_to_kg(2.20462) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cm_in_factor() {
        assert!((in_to_cm(1.0) - 2.54).abs() < 1e-12);
        assert!((cm_to_in(254.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_convert_same_unit_is_identity() {
        assert_eq!(convert(72.35, MassUnit::Kilogram, MassUnit::Kilogram), 72.35);
        assert_eq!(convert(65.0, LengthUnit::Inch, LengthUnit::Inch), 65.0);
    }

    #[test]
    fn test_convert_length() {
        let cm = convert(70.0, LengthUnit::Inch, LengthUnit::Centimeter);
        assert!((cm - 177.8).abs() < 1e-9);
    }

    #[test]
    fn test_unit_system_parse() {
        assert_eq!("metric".parse::<UnitSystem>().unwrap(), UnitSystem::Metric);
        assert_eq!("Pounds".parse::<UnitSystem>().unwrap(), UnitSystem::Imperial);
        assert!(matches!(
            "stone".parse::<UnitSystem>(),
            Err(Error::UnknownUnitSystem(_))
        ));
    }

    #[test]
    fn test_unit_system_units() {
        assert_eq!(UnitSystem::Imperial.mass_unit(), MassUnit::Pound);
        assert_eq!(UnitSystem::Metric.length_unit(), LengthUnit::Centimeter);
    }

    proptest! {
        #[test]
        fn prop_mass_round_trip(x in 1.0f64..500.0) {
            prop_assert!((kg_to_lb(lb_to_kg(x)) - x).abs() < 1e-9);
            prop_assert!((lb_to_kg(kg_to_lb(x)) - x).abs() < 1e-9);
        }

        #[test]
        fn prop_length_round_trip(x in 1.0f64..500.0) {
            prop_assert!((in_to_cm(cm_to_in(x)) - x).abs() < 1e-9);
        }
    }
}
