//! Transport errors

use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Peripheral channel closed")]
    ChannelClosed,

    #[error("Operation on {characteristic} failed: {reason}")]
    Operation { characteristic: Uuid, reason: String },
}
