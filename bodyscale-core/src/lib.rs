//! # bodyscale-core
//!
//! Core protocol implementation for Bluetooth body-composition scales.
//!
//! This crate provides the protocol primitives, free of any I/O:
//! - GATT service/characteristic identifiers
//! - Weight and body-composition frame decoding
//! - User control point responses and outgoing commands
//! - Measurement aggregation (reassembly, merge, notify throttle)
//! - The bring-up/registration state machine

pub mod aggregator;
pub mod bringup;
pub mod command;
pub mod constants;
pub mod control_point;
pub mod cursor;
pub mod error;
pub mod frame;
pub mod gatt;

pub use aggregator::{CompositionOutcome, MeasurementAggregator, WeightThrottle};
pub use bringup::{Action, Bringup, Step};
pub use command::{AthleteMode, Command, ScaleUnitMode};
pub use control_point::{Opcode, ResultCode, UserControlPointResponse};
pub use error::{Error, Result};
pub use frame::{CompositionFlags, CompositionFrame, WeightFlags, WeightFrame};
pub use gatt::{Characteristic, Service};
