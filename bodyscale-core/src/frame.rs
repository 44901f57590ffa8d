//! Weight and body-composition measurement frames
//!
//! # Weight Measurement (0x2A9D)
//!
//! ```text
//! ┌────────┬──────────┬─────────────┬─────────┬─────────┐
//! │ Flags  │  Weight  │  Timestamp  │ User ID │   BMI   │
//! │ 1 byte │ LE u16   │  7 bytes    │ 1 byte  │ LE u16  │
//! │        │          │  (bit 2)    │ (bit 3) │ (bit 4) │
//! └────────┴──────────┴─────────────┴─────────┴─────────┘
//! ```
//!
//! # Body Composition Measurement (0x2A9C)
//!
//! ```text
//! ┌──────────┬─────────┬──────────────────────────────────────────┐
//! │  Flags   │  Fat %  │  Optional fields, in flag-bit order      │
//! │  LE u16  │  LE u16 │  (each gated by its bit and by room)     │
//! └──────────┴─────────┴──────────────────────────────────────────┘
//! ```
//!
//! Flag bits are numbered from 1 at the LSB. Bit 1 selects the unit system
//! and with it the mass resolution (0.05 kg or 0.01 lb).

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use chrono::{Datelike, NaiveDateTime, Timelike};

use bodyscale_types::UnitSystem;

use crate::constants::{scale, size};
use crate::cursor::FrameReader;
use crate::error::Result;

bitflags! {
    /// Flag byte of a weight frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WeightFlags: u8 {
        const IMPERIAL = 1 << 0;
        const TIMESTAMP = 1 << 1;
        const USER_ID = 1 << 2;
        const BMI = 1 << 3;
    }
}

bitflags! {
    /// Flag word of a body-composition frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompositionFlags: u16 {
        const IMPERIAL = 1 << 0;
        const TIMESTAMP = 1 << 1;
        const USER_ID = 1 << 2;
        const BASAL_METABOLISM = 1 << 3;
        const MUSCLE_PERCENT = 1 << 4;
        const MUSCLE_MASS = 1 << 5;
        const FAT_FREE_MASS = 1 << 6;
        const SOFT_LEAN_MASS = 1 << 7;
        const BODY_WATER_MASS = 1 << 8;
        const IMPEDANCE = 1 << 9;
        const WEIGHT = 1 << 10;
        const HEIGHT = 1 << 11;
        const MULTI_PACKET = 1 << 12;
        const CUSTOM_EXTENSION = 1 << 14;
    }
}

fn unit_for(imperial: bool) -> UnitSystem {
    if imperial {
        UnitSystem::Imperial
    } else {
        UnitSystem::Metric
    }
}

/// Mass resolution for a unit system
pub fn mass_factor(unit: UnitSystem) -> f64 {
    match unit {
        UnitSystem::Metric => scale::MASS_METRIC,
        UnitSystem::Imperial => scale::MASS_IMPERIAL,
    }
}

fn height_factor(unit: UnitSystem) -> f64 {
    match unit {
        UnitSystem::Metric => scale::HEIGHT_METRIC,
        UnitSystem::Imperial => scale::HEIGHT_IMPERIAL,
    }
}

fn quantize(value: f64, factor: f64) -> u16 {
    (value / factor).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

fn put_date_time(buf: &mut BytesMut, ts: &NaiveDateTime) {
    buf.put_u16_le(ts.year().clamp(0, i32::from(u16::MAX)) as u16);
    buf.put_u8(ts.month() as u8);
    buf.put_u8(ts.day() as u8);
    buf.put_u8(ts.hour() as u8);
    buf.put_u8(ts.minute() as u8);
    buf.put_u8(ts.second() as u8);
}

/// Decoded Weight Measurement notification
#[derive(Debug, Clone, PartialEq)]
pub struct WeightFrame {
    /// Unit system the weight is reported in
    pub unit: UnitSystem,

    /// Weight in the mass unit of `unit`
    pub weight: f64,

    pub timestamp: Option<NaiveDateTime>,
    pub user_id: Option<u8>,
    pub bmi: Option<f64>,
}

impl WeightFrame {
    pub const NAME: &'static str = "weight";

    /// Decode a weight notification
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooShort`](crate::Error::FrameTooShort) if the
    /// buffer cannot hold the flag byte and the weight. A truncated optional
    /// tail is not an error; the missing fields are `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bodyscale_core::WeightFrame;
    ///
    /// let frame = WeightFrame::decode(&[0x00, 0x16, 0x05]).unwrap();
    /// assert!((frame.weight - 65.1).abs() < 1e-9);
    /// assert_eq!(frame.bmi, None);
    /// ```
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(Self::NAME, data, size::WEIGHT_PREFIX)?;

        let flags = WeightFlags::from_bits_retain(r.u8()?);
        let unit = unit_for(flags.contains(WeightFlags::IMPERIAL));
        let weight = f64::from(r.u16()?) * mass_factor(unit);

        let timestamp = r.date_time_if(flags.contains(WeightFlags::TIMESTAMP));
        let user_id = r.u8_if(flags.contains(WeightFlags::USER_ID));
        let bmi = r.scaled_if(flags.contains(WeightFlags::BMI), scale::PERCENT);

        Ok(Self {
            unit,
            weight,
            timestamp,
            user_id,
            bmi,
        })
    }

    /// Encode the frame the way the scale sends it
    ///
    /// Values are quantized to the frame's resolution.
    pub fn encode(&self) -> BytesMut {
        let mut flags = WeightFlags::empty();
        flags.set(WeightFlags::IMPERIAL, self.unit == UnitSystem::Imperial);
        flags.set(WeightFlags::TIMESTAMP, self.timestamp.is_some());
        flags.set(WeightFlags::USER_ID, self.user_id.is_some());
        flags.set(WeightFlags::BMI, self.bmi.is_some());

        let mut buf = BytesMut::with_capacity(13);
        buf.put_u8(flags.bits());
        buf.put_u16_le(quantize(self.weight, mass_factor(self.unit)));
        if let Some(ts) = &self.timestamp {
            put_date_time(&mut buf, ts);
        }
        if let Some(id) = self.user_id {
            buf.put_u8(id);
        }
        if let Some(bmi) = self.bmi {
            buf.put_u16_le(quantize(bmi, scale::PERCENT));
        }
        buf
    }
}

/// Decoded Body Composition Measurement notification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositionFrame {
    /// Unit system the masses are reported in
    pub unit: UnitSystem,

    pub fat_percent: f64,
    pub timestamp: Option<NaiveDateTime>,
    pub user_id: Option<u8>,
    pub basal_metabolism_kcal: Option<f64>,
    pub muscle_percent: Option<f64>,
    pub muscle_mass: Option<f64>,
    pub fat_free_mass: Option<f64>,
    pub soft_lean_mass: Option<f64>,
    pub body_water_mass: Option<f64>,
    pub impedance_ohm: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,

    /// Set on the first of two fragments
    pub multi_packet: bool,

    // Vendor extension (bit 15)
    pub bone_mass: Option<f64>,
    pub subcutaneous_fat_percent: Option<f64>,
    pub protein_percent: Option<f64>,
    pub metabolic_age_years: Option<u16>,
}

impl CompositionFrame {
    pub const NAME: &'static str = "body composition";

    /// Read only the flag word
    ///
    /// Used to detect the first fragment of a multi-packet frame before the
    /// rest of it has arrived.
    pub fn peek_flags(data: &[u8]) -> Result<CompositionFlags> {
        let mut r = FrameReader::new(Self::NAME, data, size::COMPOSITION_FLAGS)?;
        Ok(CompositionFlags::from_bits_retain(r.u16()?))
    }

    /// Decode a complete (or reassembled) composition frame
    ///
    /// Fields are consumed in flag-bit order, each gated by its bit and by
    /// the bytes left, exactly like [`WeightFrame::decode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(Self::NAME, data, size::COMPOSITION_PREFIX)?;

        let flags = CompositionFlags::from_bits_retain(r.u16()?);
        let has = |flag| flags.contains(flag);

        let unit = unit_for(has(CompositionFlags::IMPERIAL));
        let mass = mass_factor(unit);

        let fat_percent = f64::from(r.u16()?) * scale::PERCENT;

        let timestamp = r.date_time_if(has(CompositionFlags::TIMESTAMP));
        let user_id = r.u8_if(has(CompositionFlags::USER_ID));
        let basal_metabolism_kcal = r.scaled_if(has(CompositionFlags::BASAL_METABOLISM), 1.0);
        let muscle_percent = r.scaled_if(has(CompositionFlags::MUSCLE_PERCENT), scale::PERCENT);
        let muscle_mass = r.scaled_if(has(CompositionFlags::MUSCLE_MASS), mass);
        let fat_free_mass = r.scaled_if(has(CompositionFlags::FAT_FREE_MASS), mass);
        let soft_lean_mass = r.scaled_if(has(CompositionFlags::SOFT_LEAN_MASS), mass);
        let body_water_mass = r.scaled_if(has(CompositionFlags::BODY_WATER_MASS), mass);
        let impedance_ohm = r.scaled_if(has(CompositionFlags::IMPEDANCE), 1.0);
        let weight = r.scaled_if(has(CompositionFlags::WEIGHT), mass);
        let height = r.scaled_if(has(CompositionFlags::HEIGHT), height_factor(unit));

        let custom = has(CompositionFlags::CUSTOM_EXTENSION);
        let _ = r.u16_if(custom);
        let bone_mass = r.scaled_if(custom, mass);
        let _ = r.u8_if(custom);
        let subcutaneous_fat_percent = r.scaled_if(custom, scale::PERCENT);
        let protein_percent = r.scaled_if(custom, scale::PERCENT);
        let metabolic_age_years = r.u16_if(custom);

        Ok(Self {
            unit,
            fat_percent,
            timestamp,
            user_id,
            basal_metabolism_kcal,
            muscle_percent,
            muscle_mass,
            fat_free_mass,
            soft_lean_mass,
            body_water_mass,
            impedance_ohm,
            weight,
            height,
            multi_packet: has(CompositionFlags::MULTI_PACKET),
            bone_mass,
            subcutaneous_fat_percent,
            protein_percent,
            metabolic_age_years,
        })
    }

    /// Encode the frame as one buffer
    ///
    /// The vendor extension is written when any of its fields is present;
    /// its padding and any absent extension field are written as zero.
    pub fn encode(&self) -> BytesMut {
        let mass = mass_factor(self.unit);
        let custom = self.bone_mass.is_some()
            || self.subcutaneous_fat_percent.is_some()
            || self.protein_percent.is_some()
            || self.metabolic_age_years.is_some();

        let mut flags = CompositionFlags::empty();
        flags.set(CompositionFlags::IMPERIAL, self.unit == UnitSystem::Imperial);
        flags.set(CompositionFlags::TIMESTAMP, self.timestamp.is_some());
        flags.set(CompositionFlags::USER_ID, self.user_id.is_some());
        flags.set(CompositionFlags::BASAL_METABOLISM, self.basal_metabolism_kcal.is_some());
        flags.set(CompositionFlags::MUSCLE_PERCENT, self.muscle_percent.is_some());
        flags.set(CompositionFlags::MUSCLE_MASS, self.muscle_mass.is_some());
        flags.set(CompositionFlags::FAT_FREE_MASS, self.fat_free_mass.is_some());
        flags.set(CompositionFlags::SOFT_LEAN_MASS, self.soft_lean_mass.is_some());
        flags.set(CompositionFlags::BODY_WATER_MASS, self.body_water_mass.is_some());
        flags.set(CompositionFlags::IMPEDANCE, self.impedance_ohm.is_some());
        flags.set(CompositionFlags::WEIGHT, self.weight.is_some());
        flags.set(CompositionFlags::HEIGHT, self.height.is_some());
        flags.set(CompositionFlags::MULTI_PACKET, self.multi_packet);
        flags.set(CompositionFlags::CUSTOM_EXTENSION, custom);

        let mut buf = BytesMut::with_capacity(48);
        buf.put_u16_le(flags.bits());
        buf.put_u16_le(quantize(self.fat_percent, scale::PERCENT));

        if let Some(ts) = &self.timestamp {
            put_date_time(&mut buf, ts);
        }
        if let Some(id) = self.user_id {
            buf.put_u8(id);
        }

        let fields = [
            (self.basal_metabolism_kcal, 1.0),
            (self.muscle_percent, scale::PERCENT),
            (self.muscle_mass, mass),
            (self.fat_free_mass, mass),
            (self.soft_lean_mass, mass),
            (self.body_water_mass, mass),
            (self.impedance_ohm, 1.0),
            (self.weight, mass),
            (self.height, height_factor(self.unit)),
        ];
        for (value, factor) in fields {
            if let Some(v) = value {
                buf.put_u16_le(quantize(v, factor));
            }
        }

        if custom {
            buf.put_u16_le(0);
            buf.put_u16_le(quantize(self.bone_mass.unwrap_or_default(), mass));
            buf.put_u8(0);
            buf.put_u16_le(quantize(self.subcutaneous_fat_percent.unwrap_or_default(), scale::PERCENT));
            buf.put_u16_le(quantize(self.protein_percent.unwrap_or_default(), scale::PERCENT));
            buf.put_u16_le(self.metabolic_age_years.unwrap_or_default());
        }

        buf
    }
}
