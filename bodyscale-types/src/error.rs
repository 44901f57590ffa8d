//! Errors raised while building or parsing domain types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Unknown unit system: {0}")]
    UnknownUnitSystem(String),

    #[error("Unknown gender: {0}")]
    UnknownGender(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),
}
