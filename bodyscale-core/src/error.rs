//! Error types for bodyscale-core

use uuid::Uuid;

/// Result type alias for bodyscale-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Buffer is shorter than the frame's mandatory prefix
    #[error("{frame} frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        frame: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Control point notification that is not a response
    #[error("Unexpected control point opcode: 0x{0:02X}")]
    UnexpectedOpcode(u8),

    /// Identifier that is not part of the scale's GATT profile
    #[error("Unknown characteristic: {0}")]
    UnknownCharacteristic(Uuid),
}

impl Error {
    /// Check if the error came from decoding a malformed notification
    ///
    /// Decoding errors drop the offending frame; the connection carries on.
    pub fn is_decoding_error(&self) -> bool {
        matches!(
            self,
            Self::FrameTooShort { .. } | Self::UnexpectedOpcode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FrameTooShort {
            frame: "weight",
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "weight frame too short: expected at least 3 bytes, got 2 bytes"
        );
        assert_eq!(
            Error::UnexpectedOpcode(0x01).to_string(),
            "Unexpected control point opcode: 0x01"
        );
    }

    #[test]
    fn test_is_decoding_error() {
        assert!(Error::UnexpectedOpcode(0x05).is_decoding_error());
        assert!(!Error::UnknownCharacteristic(Uuid::nil()).is_decoding_error());
    }
}
