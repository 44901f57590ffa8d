//! Aggregated body measurement
//!
//! A reading is assembled from two independent notifications (weight and
//! body composition) that can arrive in either order. Every field except the
//! unit stays `None` until the frame that carries it has been merged.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::units::{convert, MassUnit, UnitSystem};

/// One logical scale reading
///
/// Mass-valued fields are stored in the mass unit of [`Measurement::unit`],
/// exactly as the scale reported them. Use the `*_in` accessors to read them
/// in another unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unit system the scale reported the masses in
    pub unit: UnitSystem,

    /// Time the scale stamped on the most recent frame
    pub timestamp: Option<NaiveDateTime>,

    pub weight: Option<f64>,
    pub body_mass_index: Option<f64>,
    pub fat_percent: Option<f64>,
    pub basal_metabolism_kcal: Option<f64>,
    pub muscle_percent: Option<f64>,
    pub muscle_mass: Option<f64>,
    pub fat_free_mass: Option<f64>,
    pub soft_lean_mass: Option<f64>,
    pub body_water_mass: Option<f64>,
    pub impedance_ohm: Option<f64>,
    pub bone_mass: Option<f64>,
    pub subcutaneous_fat_percent: Option<f64>,
    pub protein_percent: Option<f64>,
    pub metabolic_age_years: Option<u16>,
}

impl Measurement {
    /// Create an empty reading tagged with `unit`
    pub fn new(unit: UnitSystem) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Check if no frame has been merged yet
    pub fn is_empty(&self) -> bool {
        *self == Self::new(self.unit)
    }

    pub fn weight_in(&self, unit: MassUnit) -> Option<f64> {
        self.mass_in(self.weight, unit)
    }

    pub fn muscle_mass_in(&self, unit: MassUnit) -> Option<f64> {
        self.mass_in(self.muscle_mass, unit)
    }

    pub fn fat_free_mass_in(&self, unit: MassUnit) -> Option<f64> {
        self.mass_in(self.fat_free_mass, unit)
    }

    pub fn soft_lean_mass_in(&self, unit: MassUnit) -> Option<f64> {
        self.mass_in(self.soft_lean_mass, unit)
    }

    pub fn body_water_mass_in(&self, unit: MassUnit) -> Option<f64> {
        self.mass_in(self.body_water_mass, unit)
    }

    pub fn bone_mass_in(&self, unit: MassUnit) -> Option<f64> {
        self.mass_in(self.bone_mass, unit)
    }

    fn mass_in(&self, value: Option<f64>, unit: MassUnit) -> Option<f64> {
        value.map(|v| convert(v, self.unit.mass_unit(), unit))
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.unit.mass_unit().label();
        match self.weight {
            Some(weight) => write!(f, "{:.2} {}", weight, label)?,
            None => write!(f, "-- {}", label)?,
        }
        if let Some(fat) = self.fat_percent {
            write!(f, ", fat {:.1}%", fat)?;
        }
        if let Some(bmi) = self.body_mass_index {
            write!(f, ", BMI {:.1}", bmi)?;
        }
        Ok(())
    }
}
