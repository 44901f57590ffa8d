//! Events delivered to the host application

use std::fmt;

use bodyscale_transport::AdapterState;
use bodyscale_types::Measurement;

/// Lifecycle and measurement notifications
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleEvent {
    /// The local adapter changed power/authorization state
    BluetoothStateChanged(AdapterState),

    /// Bring-up finished; the scale is streaming measurements
    Connected,

    /// The session ended (disconnect, transport failure, adapter off)
    NotConnected,

    /// The scale assigned a user id to this profile
    UserRegistered,

    /// A settled weight reading
    WeightMeasured(Measurement),

    /// A body-composition frame was merged into the reading
    CompositeMeasured(Measurement),
}

impl ScaleEvent {
    /// Reading carried by a measurement event
    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            Self::WeightMeasured(m) | Self::CompositeMeasured(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for ScaleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BluetoothStateChanged(state) => write!(f, "Bluetooth {:?}", state),
            Self::Connected => write!(f, "Connected"),
            Self::NotConnected => write!(f, "Not connected"),
            Self::UserRegistered => write!(f, "User registered"),
            Self::WeightMeasured(m) => write!(f, "Weight measured: {}", m),
            Self::CompositeMeasured(m) => write!(f, "Composition measured: {}", m),
        }
    }
}
