//! GATT services and characteristics used by the scale
//!
//! Standard Bluetooth SIG identifiers are 16-bit aliases expanded onto the
//! base UUID `0000xxxx-0000-1000-8000-00805F9B34FB`. The two `FFEx`
//! characteristics are vendor-specific but use the same expansion.

use std::fmt;

use uuid::Uuid;

use crate::error::{Error, Result};

const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Expand a 16-bit SIG alias to a full UUID
pub const fn uuid16(alias: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID | ((alias as u128) << 96))
}

/// Services the scale advertises
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Service {
    BodyComposition,
    UserData,
    WeightScale,
}

impl Service {
    /// Every service the bring-up needs discovered
    pub const ALL: [Service; 3] = [Self::BodyComposition, Self::UserData, Self::WeightScale];

    pub const fn uuid(self) -> Uuid {
        match self {
            Self::BodyComposition => uuid16(0x181B),
            Self::UserData => uuid16(0x181C),
            Self::WeightScale => uuid16(0x181D),
        }
    }

    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.uuid() == uuid)
    }
}

/// Characteristics of the scale's GATT profile
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Characteristic {
    // Weight Scale service
    WeightScaleFeature,
    WeightMeasurement,

    // Body Composition service
    BodyCompositionMeasurement,
    /// Vendor notify characteristic
    VendorNotify,
    /// Vendor write characteristic (unit selection)
    VendorWrite,

    // User Data service
    UserAge,
    UserDateOfBirth,
    UserGender,
    UserHeight,
    UserControlPoint,
    /// Vendor athlete-mode characteristic
    AthleteMode,
}

impl Characteristic {
    pub const ALL: [Characteristic; 11] = [
        Self::WeightScaleFeature,
        Self::WeightMeasurement,
        Self::BodyCompositionMeasurement,
        Self::VendorNotify,
        Self::VendorWrite,
        Self::UserAge,
        Self::UserDateOfBirth,
        Self::UserGender,
        Self::UserHeight,
        Self::UserControlPoint,
        Self::AthleteMode,
    ];

    /// Characteristics that must be discovered before bring-up can start
    pub const REQUIRED: [Characteristic; 10] = [
        Self::BodyCompositionMeasurement,
        Self::WeightMeasurement,
        Self::UserControlPoint,
        Self::VendorNotify,
        Self::VendorWrite,
        Self::UserGender,
        Self::UserHeight,
        Self::UserDateOfBirth,
        Self::UserAge,
        Self::AthleteMode,
    ];

    pub const fn uuid(self) -> Uuid {
        match self {
            Self::WeightScaleFeature => uuid16(0x2A9E),
            Self::WeightMeasurement => uuid16(0x2A9D),
            Self::BodyCompositionMeasurement => uuid16(0x2A9C),
            Self::VendorNotify => uuid16(0xFFE1),
            Self::VendorWrite => uuid16(0xFFE2),
            Self::UserAge => uuid16(0x2A80),
            Self::UserDateOfBirth => uuid16(0x2A85),
            Self::UserGender => uuid16(0x2A8C),
            Self::UserHeight => uuid16(0x2A8E),
            Self::UserControlPoint => uuid16(0x2A9F),
            Self::AthleteMode => uuid16(0x2AFF),
        }
    }

    /// Service the characteristic lives in
    pub const fn service(self) -> Service {
        match self {
            Self::WeightScaleFeature | Self::WeightMeasurement => Service::WeightScale,
            Self::BodyCompositionMeasurement | Self::VendorNotify | Self::VendorWrite => {
                Service::BodyComposition
            }
            Self::UserAge
            | Self::UserDateOfBirth
            | Self::UserGender
            | Self::UserHeight
            | Self::UserControlPoint
            | Self::AthleteMode => Service::UserData,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::WeightScaleFeature => "weight-scale-feature",
            Self::WeightMeasurement => "weight-measurement",
            Self::BodyCompositionMeasurement => "body-composition-measurement",
            Self::VendorNotify => "vendor-notify",
            Self::VendorWrite => "vendor-write",
            Self::UserAge => "age",
            Self::UserDateOfBirth => "date-of-birth",
            Self::UserGender => "gender",
            Self::UserHeight => "height",
            Self::UserControlPoint => "user-control-point",
            Self::AthleteMode => "athlete-mode",
        }
    }
}

impl TryFrom<Uuid> for Characteristic {
    type Error = Error;

    fn try_from(uuid: Uuid) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.uuid() == uuid)
            .ok_or(Error::UnknownCharacteristic(uuid))
    }
}

impl From<Characteristic> for Uuid {
    fn from(characteristic: Characteristic) -> Uuid {
        characteristic.uuid()
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.uuid())
    }
}
