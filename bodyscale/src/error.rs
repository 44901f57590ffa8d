//! High-level error types

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] bodyscale_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] bodyscale_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] bodyscale_types::Error),

    #[error("Profile store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No user profile stored")]
    NoProfile,

    #[error("Engine stopped")]
    EngineStopped,
}
