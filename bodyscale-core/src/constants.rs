//! Protocol constants

use std::time::Duration;

use bodyscale_types::UserProfile;

/// Interval of the bring-up liveness tick
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Quiet period after the last weight frame before a reading is announced
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Minimum spacing between two weight announcements
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(10);

/// Highest passcode the scale accepts at registration
pub const MAX_PASSCODE: u16 = UserProfile::MAX_PASSCODE;

/// Number of user slots enumerated by the delete-all-users command
pub const USER_SLOT_COUNT: u8 = 17;

/// Scaling factors applied to raw frame values
pub mod scale {
    /// Mass resolution when the frame reports kilograms
    pub const MASS_METRIC: f64 = 0.05;

    /// Mass resolution when the frame reports pounds
    pub const MASS_IMPERIAL: f64 = 0.01;

    /// Resolution of percentages and BMI
    pub const PERCENT: f64 = 0.1;

    /// Height resolution when the frame reports metres/centimetres
    pub const HEIGHT_METRIC: f64 = 1.0;

    /// Height resolution when the frame reports inches
    pub const HEIGHT_IMPERIAL: f64 = 0.01;
}

/// Frame sizes
pub mod size {
    /// Flag byte + weight
    pub const WEIGHT_PREFIX: usize = 3;

    /// Flag word + fat percentage
    pub const COMPOSITION_PREFIX: usize = 4;

    /// Flag word alone (enough to detect a multi-packet frame)
    pub const COMPOSITION_FLAGS: usize = 2;

    /// Opcode + result code
    pub const CONTROL_POINT_RESPONSE: usize = 2;

    /// Year (u16) + month, day, hour, minute, second
    pub const DATE_TIME: usize = 7;
}
