//! User Control Point (0x2A9F) responses
//!
//! The scale answers every control point write with an indication laid out
//! as:
//!
//! ```text
//! ┌──────────┬────────────────┬─────────────┬─────────────────┐
//! │   0x20   │ Request opcode │ Result code │ Parameter (opt) │
//! │  1 byte  │     1 byte     │   1 byte    │     1 byte      │
//! └──────────┴────────────────┴─────────────┴─────────────────┘
//! ```
//!
//! [`UserControlPointResponse`] covers everything after the leading
//! Response opcode.

use std::fmt;

use crate::constants::size;
use crate::cursor::FrameReader;
use crate::error::{Error, Result};

/// Control point operation codes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    RegisterNewUser,
    Consent,
    DeleteUser,
    ListAllUsers,
    DeleteUsers,
    Response,
    /// Code this implementation does not know
    Unknown(u8),
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Self::RegisterNewUser => "REGISTER_NEW_USER",
            Self::Consent => "CONSENT",
            Self::DeleteUser => "DELETE_USER",
            Self::ListAllUsers => "LIST_ALL_USERS",
            Self::DeleteUsers => "DELETE_USERS",
            Self::Response => "RESPONSE",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::RegisterNewUser,
            0x02 => Self::Consent,
            0x03 => Self::DeleteUser,
            0x04 => Self::ListAllUsers,
            0x05 => Self::DeleteUsers,
            0x20 => Self::Response,
            other => Self::Unknown(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        match op {
            Opcode::RegisterNewUser => 0x01,
            Opcode::Consent => 0x02,
            Opcode::DeleteUser => 0x03,
            Opcode::ListAllUsers => 0x04,
            Opcode::DeleteUsers => 0x05,
            Opcode::Response => 0x20,
            Opcode::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), u8::from(*self))
    }
}

/// Result codes carried in a response
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    NotSupported,
    InvalidParameter,
    OperationFailed,
    NotAuthorized,
    Unknown(u8),
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<u8> for ResultCode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::Success,
            0x02 => Self::NotSupported,
            0x03 => Self::InvalidParameter,
            0x04 => Self::OperationFailed,
            0x05 => Self::NotAuthorized,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NotSupported => write!(f, "not supported"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::OperationFailed => write!(f, "operation failed"),
            Self::NotAuthorized => write!(f, "not authorized"),
            Self::Unknown(raw) => write!(f, "unknown result 0x{:02X}", raw),
        }
    }
}

/// Outcome of one control point request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserControlPointResponse {
    /// Request this response answers
    pub operation: Opcode,

    pub result: ResultCode,

    /// Single result parameter, e.g. the user index assigned at registration
    pub parameter: Option<u8>,
}

impl UserControlPointResponse {
    const NAME: &'static str = "control point response";

    /// Decode `[opcode, result, parameter?]`
    ///
    /// # Examples
    ///
    /// ```
    /// use bodyscale_core::{Opcode, ResultCode, UserControlPointResponse};
    ///
    /// let r = UserControlPointResponse::decode(&[0x01, 0x01, 0x07]).unwrap();
    /// assert_eq!(r.operation, Opcode::RegisterNewUser);
    /// assert_eq!(r.result, ResultCode::Success);
    /// assert_eq!(r.parameter, Some(7));
    /// ```
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(Self::NAME, data, size::CONTROL_POINT_RESPONSE)?;

        let operation = Opcode::from(r.u8()?);
        let result = ResultCode::from(r.u8()?);
        let parameter = r.u8_if(true);

        Ok(Self {
            operation,
            result,
            parameter,
        })
    }

    /// Decode a full indication as sent on the wire
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedOpcode`] if the indication does not start
    /// with the Response opcode.
    pub fn decode_indication(data: &[u8]) -> Result<Self> {
        match data.split_first() {
            Some((&0x20, body)) => Self::decode(body),
            Some((&other, _)) => Err(Error::UnexpectedOpcode(other)),
            None => Err(Error::FrameTooShort {
                frame: Self::NAME,
                expected: 1 + size::CONTROL_POINT_RESPONSE,
                actual: 0,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

impl fmt::Display for UserControlPointResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.operation, self.result)?;
        if let Some(p) = self.parameter {
            write!(f, " [{}]", p)?;
        }
        Ok(())
    }
}
