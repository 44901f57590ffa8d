//! Events delivered by the radio

use bytes::Bytes;
use uuid::Uuid;

use bodyscale_core::Characteristic;

/// Power/authorization state of the local Bluetooth adapter
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum AdapterState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    pub fn is_powered_on(self) -> bool {
        self == Self::PoweredOn
    }
}

/// Something the radio reports about the adapter or the connected scale
///
/// Identifiers are raw UUIDs as discovered; the engine resolves them
/// against its characteristic table and ignores anything it does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    AdapterState(AdapterState),

    /// Link established with a scale
    Connected,

    ServicesDiscovered(Vec<Uuid>),

    CharacteristicsDiscovered {
        service: Uuid,
        characteristics: Vec<Uuid>,
    },

    WriteAck(Uuid),

    SubscribeAck(Uuid),

    /// Notification or indication
    Value { characteristic: Uuid, value: Bytes },

    /// A write or subscribe was rejected
    OperationFailed { characteristic: Uuid, reason: String },

    Disconnected,
}

impl PeripheralEvent {
    /// Notification on a known characteristic
    pub fn value(characteristic: Characteristic, value: impl Into<Bytes>) -> Self {
        Self::Value {
            characteristic: characteristic.uuid(),
            value: value.into(),
        }
    }

    pub fn write_ack(characteristic: Characteristic) -> Self {
        Self::WriteAck(characteristic.uuid())
    }

    pub fn subscribe_ack(characteristic: Characteristic) -> Self {
        Self::SubscribeAck(characteristic.uuid())
    }

    /// Discovery result listing known characteristics of `service`
    pub fn characteristics_discovered(
        service: bodyscale_core::Service,
        characteristics: impl IntoIterator<Item = Characteristic>,
    ) -> Self {
        Self::CharacteristicsDiscovered {
            service: service.uuid(),
            characteristics: characteristics.into_iter().map(Characteristic::uuid).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodyscale_core::Service;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_constructors_use_protocol_uuids() {
        assert_eq!(
            PeripheralEvent::subscribe_ack(Characteristic::WeightMeasurement),
            PeripheralEvent::SubscribeAck(Characteristic::WeightMeasurement.uuid())
        );

        let event = PeripheralEvent::characteristics_discovered(
            Service::WeightScale,
            [Characteristic::WeightMeasurement, Characteristic::WeightScaleFeature],
        );
        let PeripheralEvent::CharacteristicsDiscovered { service, characteristics } = event else {
            panic!("expected a discovery event");
        };
        assert_eq!(service, Service::WeightScale.uuid());
        assert_eq!(characteristics.len(), 2);
    }

    #[test]
    fn test_adapter_state() {
        assert!(AdapterState::PoweredOn.is_powered_on());
        assert!(!AdapterState::default().is_powered_on());
    }
}
