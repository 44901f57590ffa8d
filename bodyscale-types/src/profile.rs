//! User profile registered with the scale

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::units::{convert, LengthUnit, UnitSystem};

/// Gender pushed to the scale's user-data service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    #[default]
    Female,
    Unspecified,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
            Self::Unspecified => write!(f, "unspecified"),
        }
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            "unspecified" | "u" => Ok(Self::Unspecified),
            _ => Err(Error::UnknownGender(s.to_string())),
        }
    }
}

/// The single user this application registers on the scale
///
/// `id == 0` means the user is not registered with the device yet.
/// `profile_written` records whether the body metadata (gender, height,
/// date of birth, age, athlete mode) has been pushed to the physical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Device-assigned user index (0 = unregistered)
    #[serde(default)]
    pub id: u8,

    /// Consent passcode chosen at registration (0..=9999)
    #[serde(default)]
    pub passcode: u16,

    /// Preferred unit system
    pub unit: UnitSystem,

    /// Height, expressed in the length unit of `unit`
    pub height: u16,

    pub date_of_birth: NaiveDate,

    pub gender: Gender,

    #[serde(default)]
    pub profile_written: bool,
}

impl UserProfile {
    /// Highest passcode the scale accepts
    pub const MAX_PASSCODE: u16 = 9999;

    /// Create an unregistered profile
    pub fn new(unit: UnitSystem, height: u16, date_of_birth: NaiveDate, gender: Gender) -> Self {
        Self {
            id: 0,
            passcode: 0,
            unit,
            height,
            date_of_birth,
            gender,
            profile_written: false,
        }
    }

    /// Check if the user has a device-assigned id
    pub fn is_registered(&self) -> bool {
        self.id != 0
    }

    /// Height in centimetres, whatever unit the profile is kept in
    pub fn height_cm(&self) -> f64 {
        convert(
            f64::from(self.height),
            self.unit.length_unit(),
            LengthUnit::Centimeter,
        )
    }

    /// Age in whole years on `today`
    pub fn age_on(&self, today: NaiveDate) -> u8 {
        let dob = self.date_of_birth;
        let mut years = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        years.clamp(0, i32::from(u8::MAX)) as u8
    }

    /// Forget the device registration
    ///
    /// Used after the scale's user table has been wiped: the next bring-up
    /// registers again and re-pushes body metadata.
    pub fn reset_registration(&mut self) {
        self.id = 0;
        self.passcode = 0;
        self.profile_written = false;
    }

    /// Apply a local edit of the body metadata
    ///
    /// Returns `true` when anything changed, in which case `profile_written`
    /// is cleared so the metadata is pushed again on the next connection.
    pub fn apply_edit(
        &mut self,
        unit: UnitSystem,
        height: u16,
        date_of_birth: NaiveDate,
        gender: Gender,
    ) -> bool {
        let changed = self.unit != unit
            || self.height != height
            || self.date_of_birth != date_of_birth
            || self.gender != gender;

        if changed {
            self.unit = unit;
            self.height = height;
            self.date_of_birth = date_of_birth;
            self.gender = gender;
            self.profile_written = false;
        }

        changed
    }

    /// Check the profile is something the scale can store
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if self.height == 0 {
            return Err(Error::InvalidProfile("height must be positive".into()));
        }
        if self.passcode > Self::MAX_PASSCODE {
            return Err(Error::InvalidProfile(format!(
                "passcode {} exceeds {}",
                self.passcode,
                Self::MAX_PASSCODE
            )));
        }
        if self.date_of_birth > today {
            return Err(Error::InvalidProfile(format!(
                "date of birth {} is in the future",
                self.date_of_birth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn profile() -> UserProfile {
        UserProfile::new(UnitSystem::Metric, 172, date(1985, 6, 15), Gender::Male)
    }

    #[test]
    fn test_new_profile_is_unregistered() {
        let p = profile();
        assert!(!p.is_registered());
        assert!(!p.profile_written);
        assert_eq!(p.passcode, 0);
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let p = profile();
        assert_eq!(p.age_on(date(2021, 6, 14)), 35);
        assert_eq!(p.age_on(date(2021, 6, 15)), 36);
    }

    #[test]
    fn test_height_cm_imperial() {
        let mut p = profile();
        p.unit = UnitSystem::Imperial;
        p.height = 70;
        assert!((p.height_cm() - 177.8).abs() < 1e-9);
    }

    #[test]
    fn test_reset_registration() {
        let mut p = profile();
        p.id = 3;
        p.passcode = 1234;
        p.profile_written = true;

        p.reset_registration();

        assert_eq!(p.id, 0);
        assert_eq!(p.passcode, 0);
        assert!(!p.profile_written);
    }

    #[test]
    fn test_apply_edit_clears_written_flag() {
        let mut p = profile();
        p.profile_written = true;

        assert!(!p.apply_edit(p.unit, p.height, p.date_of_birth, p.gender));
        assert!(p.profile_written);

        assert!(p.apply_edit(p.unit, 180, p.date_of_birth, p.gender));
        assert!(!p.profile_written);
        assert_eq!(p.height, 180);
    }

    #[test]
    fn test_validate() {
        let today = date(2024, 1, 1);
        assert!(profile().validate(today).is_ok());

        let mut p = profile();
        p.height = 0;
        assert!(p.validate(today).is_err());

        let mut p = profile();
        p.date_of_birth = date(2030, 1, 1);
        assert!(p.validate(today).is_err());
    }

    #[test]
    fn test_json_defaults_for_registration_fields() {
        let json = r#"{"unit":"imperial","height":66,"date_of_birth":"1990-02-03","gender":"female"}"#;
        let p: UserProfile = serde_json::from_str(json).unwrap();

        assert_eq!(p.unit, UnitSystem::Imperial);
        assert_eq!(p.id, 0);
        assert!(!p.profile_written);
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!("M".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("unspecified".parse::<Gender>().unwrap(), Gender::Unspecified);
        assert!("other".parse::<Gender>().is_err());
    }
}
