//! Commands written to the scale

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, NaiveDate};

use bodyscale_types::{Gender, UnitSystem};

use crate::constants::USER_SLOT_COUNT;
use crate::control_point::Opcode;
use crate::gatt::Characteristic;

/// Display unit understood by the vendor write characteristic
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScaleUnitMode {
    Kilogram = 0x01,
    Pound = 0x02,
    Stone = 0x03,
}

impl From<UnitSystem> for ScaleUnitMode {
    fn from(unit: UnitSystem) -> Self {
        match unit {
            UnitSystem::Metric => Self::Kilogram,
            UnitSystem::Imperial => Self::Pound,
        }
    }
}

/// Body-composition model selected on the scale
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AthleteMode {
    #[default]
    Normal = 0x0004,
    Athlete = 0x000E,
}

/// Gender codes of the User Data service
pub mod gender_code {
    pub const MALE: u8 = 0x00;
    pub const FEMALE: u8 = 0x01;
    pub const UNSPECIFIED: u8 = 0x02;
}

/// A write the bring-up sends to the scale
///
/// Every command is written with response; its effect is acknowledged
/// separately (write acknowledgement or control point indication).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // User control point
    RegisterNewUser { passcode: u16 },
    Consent { user_id: u8, passcode: u16 },
    DeleteUser,
    DeleteAllUsers,

    // Vendor
    SetUnit(ScaleUnitMode),
    SetAthleteMode(AthleteMode),

    // User data
    SetGender(Gender),
    /// Height in whole centimetres
    SetHeight(u16),
    SetDateOfBirth(NaiveDate),
    /// Age in whole years
    SetAge(u8),
}

impl Command {
    /// Characteristic the command is written to
    pub fn characteristic(&self) -> Characteristic {
        match self {
            Self::RegisterNewUser { .. }
            | Self::Consent { .. }
            | Self::DeleteUser
            | Self::DeleteAllUsers => Characteristic::UserControlPoint,
            Self::SetUnit(_) => Characteristic::VendorWrite,
            Self::SetAthleteMode(_) => Characteristic::AthleteMode,
            Self::SetGender(_) => Characteristic::UserGender,
            Self::SetHeight(_) => Characteristic::UserHeight,
            Self::SetDateOfBirth(_) => Characteristic::UserDateOfBirth,
            Self::SetAge(_) => Characteristic::UserAge,
        }
    }

    /// Check if the scale answers this command on the control point
    pub fn is_control_point(&self) -> bool {
        self.characteristic() == Characteristic::UserControlPoint
    }

    /// Encode the command payload
    ///
    /// # Examples
    ///
    /// ```
    /// use bodyscale_core::Command;
    ///
    /// let bytes = Command::Consent { user_id: 3, passcode: 0x1234 }.encode();
    /// assert_eq!(bytes.as_ref(), &[0x02, 0x03, 0x34, 0x12]);
    /// ```
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4);

        match self {
            Self::RegisterNewUser { passcode } => {
                buf.put_u8(Opcode::RegisterNewUser.into());
                buf.put_u16_le(*passcode);
            }
            Self::Consent { user_id, passcode } => {
                buf.put_u8(Opcode::Consent.into());
                buf.put_u8(*user_id);
                buf.put_u16_le(*passcode);
            }
            Self::DeleteUser => {
                buf.put_u8(Opcode::DeleteUser.into());
            }
            Self::DeleteAllUsers => {
                buf.put_u8(Opcode::DeleteUsers.into());
                // Firmware expects every slot index listed
                for slot in 1..=USER_SLOT_COUNT {
                    buf.put_u8(slot);
                }
            }
            Self::SetUnit(mode) => {
                let mode = *mode as u8;
                buf.put_slice(&[0x03, 0x00, mode, 0x03 + mode]);
            }
            Self::SetAthleteMode(mode) => {
                buf.put_u16_le(*mode as u16);
            }
            Self::SetGender(gender) => {
                buf.put_u8(match gender {
                    Gender::Male => gender_code::MALE,
                    Gender::Female => gender_code::FEMALE,
                    Gender::Unspecified => gender_code::UNSPECIFIED,
                });
            }
            Self::SetHeight(cm) => {
                buf.put_u16_le(*cm);
            }
            Self::SetDateOfBirth(date) => {
                buf.put_u16_le(date.year().clamp(0, i32::from(u16::MAX)) as u16);
                buf.put_u8(date.month() as u8);
                buf.put_u8(date.day() as u8);
            }
            Self::SetAge(age) => {
                buf.put_u8(*age);
            }
        }

        buf.freeze()
    }

    /// Get command name
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterNewUser { .. } => "REGISTER_NEW_USER",
            Self::Consent { .. } => "CONSENT",
            Self::DeleteUser => "DELETE_USER",
            Self::DeleteAllUsers => "DELETE_ALL_USERS",
            Self::SetUnit(_) => "SET_UNIT",
            Self::SetAthleteMode(_) => "SET_ATHLETE_MODE",
            Self::SetGender(_) => "SET_GENDER",
            Self::SetHeight(_) => "SET_HEIGHT",
            Self::SetDateOfBirth(_) => "SET_DATE_OF_BIRTH",
            Self::SetAge(_) => "SET_AGE",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name(), self.characteristic().name())
    }
}
