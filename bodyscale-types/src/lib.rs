//! Type definitions for bodyscale

pub mod error;
pub mod measurement;
pub mod profile;
pub mod units;

pub use error::{Error, Result};
pub use measurement::Measurement;
pub use profile::{Gender, UserProfile};
pub use units::{convert, LengthUnit, LinearUnit, MassUnit, UnitSystem};
