//! Measurement aggregation
//!
//! Weight and body-composition notifications arrive on two independent
//! characteristics, in no particular order. The aggregator merges both into
//! one [`Measurement`], reassembles composition frames the scale splits over
//! two notifications, and throttles weight announcements.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, trace};

use bodyscale_types::{convert, Measurement, UnitSystem};

use crate::error::Result;
use crate::frame::{CompositionFlags, CompositionFrame, WeightFrame};

/// Result of feeding one composition notification
#[derive(Debug, Clone, PartialEq)]
pub enum CompositionOutcome {
    /// First fragment stored, waiting for its continuation
    Pending,

    /// Frame decoded and merged
    Complete(CompositionFrame),
}

/// In-flight reading for one connection
#[derive(Debug, Clone)]
pub struct MeasurementAggregator {
    measurement: Measurement,

    /// First fragment of a multi-packet composition frame
    pending: Option<BytesMut>,
}

impl MeasurementAggregator {
    /// Start an empty reading
    pub fn new(unit: UnitSystem) -> Self {
        Self {
            measurement: Measurement::new(unit),
            pending: None,
        }
    }

    /// Current reading
    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// Check if a composition fragment is waiting for its continuation
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Merge a weight frame
    ///
    /// Weight and BMI are stored as reported; unit conversion happens when
    /// the measurement is read.
    pub fn on_weight_frame(&mut self, frame: &WeightFrame) {
        let m = &mut self.measurement;

        if m.unit != frame.unit {
            convert_masses(m, frame.unit);
        }

        m.unit = frame.unit;
        m.weight = Some(frame.weight);
        if frame.bmi.is_some() {
            m.body_mass_index = frame.bmi;
        }
        if frame.timestamp.is_some() {
            m.timestamp = frame.timestamp;
        }

        trace!(weight = frame.weight, unit = %frame.unit, "Merged weight frame");
    }

    /// Feed one Body Composition Measurement notification
    ///
    /// A frame with the multi-packet bit is held until the next
    /// notification, which is appended to it before decoding. A held
    /// fragment never expires.
    ///
    /// # Errors
    ///
    /// Returns a decoding error if the notification (or the reassembled
    /// buffer) is shorter than the mandatory prefix. The frame is dropped
    /// and any held fragment is discarded.
    pub fn on_composition_notification(&mut self, data: &[u8]) -> Result<CompositionOutcome> {
        let frame = match self.pending.take() {
            Some(mut buf) => {
                buf.extend_from_slice(data);
                debug!(len = buf.len(), "Reassembled multi-packet composition frame");
                CompositionFrame::decode(&buf)?
            }
            None => {
                let flags = CompositionFrame::peek_flags(data)?;
                if flags.contains(CompositionFlags::MULTI_PACKET) {
                    debug!(len = data.len(), "Holding first composition fragment");
                    self.pending = Some(BytesMut::from(data));
                    return Ok(CompositionOutcome::Pending);
                }
                CompositionFrame::decode(data)?
            }
        };

        self.merge_composition(&frame);
        Ok(CompositionOutcome::Complete(frame))
    }

    /// Merge a decoded composition frame
    ///
    /// Present fields overwrite, absent fields leave the reading untouched.
    /// Masses are expressed in the reading's unit.
    pub fn merge_composition(&mut self, frame: &CompositionFrame) {
        let m = &mut self.measurement;
        let mass = |v: Option<f64>| {
            v.map(|v| convert(v, frame.unit.mass_unit(), m.unit.mass_unit()))
        };

        let muscle_mass = mass(frame.muscle_mass);
        let fat_free_mass = mass(frame.fat_free_mass);
        let soft_lean_mass = mass(frame.soft_lean_mass);
        let body_water_mass = mass(frame.body_water_mass);
        let bone_mass = mass(frame.bone_mass);

        overwrite(&mut m.fat_percent, Some(frame.fat_percent));
        overwrite(&mut m.timestamp, frame.timestamp);
        overwrite(&mut m.basal_metabolism_kcal, frame.basal_metabolism_kcal);
        overwrite(&mut m.muscle_percent, frame.muscle_percent);
        overwrite(&mut m.muscle_mass, muscle_mass);
        overwrite(&mut m.fat_free_mass, fat_free_mass);
        overwrite(&mut m.soft_lean_mass, soft_lean_mass);
        overwrite(&mut m.body_water_mass, body_water_mass);
        overwrite(&mut m.impedance_ohm, frame.impedance_ohm);
        overwrite(&mut m.bone_mass, bone_mass);
        overwrite(&mut m.subcutaneous_fat_percent, frame.subcutaneous_fat_percent);
        overwrite(&mut m.protein_percent, frame.protein_percent);
        overwrite(&mut m.metabolic_age_years, frame.metabolic_age_years);

        trace!(fat = frame.fat_percent, "Merged composition frame");
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Re-express stored masses when the scale switches unit mid-reading
fn convert_masses(m: &mut Measurement, to: UnitSystem) {
    let (from, to) = (m.unit.mass_unit(), to.mass_unit());
    for slot in [
        &mut m.weight,
        &mut m.muscle_mass,
        &mut m.fat_free_mass,
        &mut m.soft_lean_mass,
        &mut m.body_water_mass,
        &mut m.bone_mass,
    ] {
        *slot = slot.map(|v| convert(v, from, to));
    }
}

/// Rate limit on weight announcements
///
/// At most one announcement per `window`.
#[derive(Debug, Clone)]
pub struct WeightThrottle {
    window: Duration,
    last_fired_at: Option<Instant>,
}

impl WeightThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired_at: None,
        }
    }

    /// Decide whether an announcement at `now` may fire, recording it if so
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_fired_at {
            if now.saturating_duration_since(last) < self.window {
                debug!(
                    since_ms = now.saturating_duration_since(last).as_millis() as u64,
                    "Weight announcement suppressed"
                );
                return false;
            }
        }

        self.last_fired_at = Some(now);
        true
    }

    pub fn last_fired_at(&self) -> Option<Instant> {
        self.last_fired_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const COMPOSITION_CAPTURE: &str = "7E 53 06 01 E5 07 03 07 0F 15 28 04 1E 05 AE 01 32 03 \
        66 03 FA 01 FE 01 F4 01 34 00 04 F6 00 AE 00 3B 00 96 03 04 00";

    fn capture() -> Vec<u8> {
        hex::decode(COMPOSITION_CAPTURE.replace(' ', "")).unwrap()
    }

    fn weight(kg: f64, bmi: Option<f64>) -> WeightFrame {
        WeightFrame {
            unit: UnitSystem::Metric,
            weight: kg,
            timestamp: None,
            user_id: Some(1),
            bmi,
        }
    }

    fn single_packet() -> Vec<u8> {
        // Fat 20.0%, muscle percent 40.0%
        vec![0x10, 0x00, 0xC8, 0x00, 0x90, 0x01]
    }

    #[test]
    fn test_weight_then_composition() {
        let mut agg = MeasurementAggregator::new(UnitSystem::Metric);
        agg.on_weight_frame(&weight(65.1, Some(24.8)));

        let outcome = agg.on_composition_notification(&single_packet()).unwrap();
        assert!(matches!(outcome, CompositionOutcome::Complete(_)));

        let m = agg.measurement();
        assert_eq!(m.weight, Some(65.1));
        assert_eq!(m.body_mass_index, Some(24.8));
        assert!((m.fat_percent.unwrap() - 20.0).abs() < 1e-9);
        assert!((m.muscle_percent.unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_composition_then_weight() {
        let mut agg = MeasurementAggregator::new(UnitSystem::Metric);
        agg.on_composition_notification(&single_packet()).unwrap();
        agg.on_weight_frame(&weight(70.0, None));

        let m = agg.measurement();
        assert_eq!(m.weight, Some(70.0));
        assert!(m.fat_percent.is_some());
        assert!(m.muscle_percent.is_some());
    }

    #[test]
    fn test_absent_fields_do_not_reset() {
        let mut agg = MeasurementAggregator::new(UnitSystem::Metric);
        agg.on_weight_frame(&weight(70.0, Some(22.0)));
        agg.on_weight_frame(&weight(70.5, None));

        assert_eq!(agg.measurement().body_mass_index, Some(22.0));
        assert_eq!(agg.measurement().weight, Some(70.5));

        agg.on_composition_notification(&single_packet()).unwrap();
        // Only fat and muscle percent: the second frame keeps earlier fields
        agg.on_composition_notification(&[0x00, 0x00, 0xD2, 0x00]).unwrap();

        let m = agg.measurement();
        assert!((m.fat_percent.unwrap() - 21.0).abs() < 1e-9);
        assert!((m.muscle_percent.unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_multi_packet_reassembly() {
        let bytes = capture();
        let mut agg = MeasurementAggregator::new(UnitSystem::Metric);

        let first = agg.on_composition_notification(&bytes[..20]).unwrap();
        assert_eq!(first, CompositionOutcome::Pending);
        assert!(agg.is_pending());
        assert!(agg.measurement().fat_percent.is_none());

        let second = agg.on_composition_notification(&bytes[20..]).unwrap();
        let CompositionOutcome::Complete(frame) = second else {
            panic!("expected a complete frame");
        };
        assert!(!agg.is_pending());
        assert_eq!(frame, CompositionFrame::decode(&bytes).unwrap());
        assert_eq!(agg.measurement().metabolic_age_years, Some(59));
    }

    #[test]
    fn test_fragment_without_continuation_stays_pending() {
        let bytes = capture();
        let mut agg = MeasurementAggregator::new(UnitSystem::Metric);
        agg.on_composition_notification(&bytes[..20]).unwrap();
        agg.on_weight_frame(&weight(65.0, None));

        assert!(agg.is_pending());
        assert_eq!(agg.measurement().fat_percent, None);
    }

    #[test]
    fn test_short_notification_is_dropped() {
        let mut agg = MeasurementAggregator::new(UnitSystem::Metric);
        let result = agg.on_composition_notification(&[0x00]);

        assert!(matches!(result, Err(Error::FrameTooShort { .. })));
        assert!(agg.measurement().is_empty());
        assert!(!agg.is_pending());
    }

    #[test]
    fn test_unit_change_converts_stored_masses() {
        let mut agg = MeasurementAggregator::new(UnitSystem::Metric);
        agg.merge_composition(&CompositionFrame::decode(&capture()).unwrap());
        let kg = agg.measurement().muscle_mass.unwrap();

        let mut lb = weight(150.0, None);
        lb.unit = UnitSystem::Imperial;
        agg.on_weight_frame(&lb);

        let m = agg.measurement();
        assert_eq!(m.unit, UnitSystem::Imperial);
        assert!((m.muscle_mass.unwrap() - kg * 2.20462).abs() < 1e-9);
    }

    #[test]
    fn test_throttle_window() {
        let start = Instant::now();
        let mut throttle = WeightThrottle::new(Duration::from_secs(10));

        assert!(throttle.try_fire(start));
        assert!(!throttle.try_fire(start + Duration::from_secs(3)));
        assert!(!throttle.try_fire(start + Duration::from_millis(9_999)));
        assert!(throttle.try_fire(start + Duration::from_secs(10)));
        assert_eq!(throttle.last_fired_at(), Some(start + Duration::from_secs(10)));
    }

    proptest! {
        #[test]
        fn prop_reassembly_independent_of_split(split in 2usize..39) {
            let bytes = capture();
            let mut agg = MeasurementAggregator::new(UnitSystem::Metric);

            prop_assert_eq!(
                agg.on_composition_notification(&bytes[..split]).unwrap(),
                CompositionOutcome::Pending
            );
            let outcome = agg.on_composition_notification(&bytes[split..]).unwrap();

            prop_assert_eq!(
                outcome,
                CompositionOutcome::Complete(CompositionFrame::decode(&bytes).unwrap())
            );
        }
    }
}
