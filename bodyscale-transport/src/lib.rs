//! Peripheral seam for Bluetooth body-composition scales
//!
//! The engine never talks to a radio directly. It issues requests through a
//! [`Peripheral`] and consumes the radio's asynchronous answers as a stream
//! of [`PeripheralEvent`]s. Every request is fire-and-forget: its outcome
//! arrives later as an acknowledgement event.

pub mod channel;
pub mod error;
pub mod event;

pub use channel::{ChannelPeripheral, PeripheralRequest};
pub use error::{Error, Result};
pub use event::{AdapterState, PeripheralEvent};

use async_trait::async_trait;
use bytes::Bytes;

use bodyscale_core::{Characteristic, Service};

/// Control capability over one connected scale
#[async_trait]
pub trait Peripheral: Send {
    /// Start service discovery
    async fn discover_services(&mut self) -> Result<()>;

    /// Start characteristic discovery for one service
    async fn discover_characteristics(&mut self, service: Service) -> Result<()>;

    /// Write a value, acknowledged with [`PeripheralEvent::WriteAck`] when
    /// `with_ack` is set
    async fn write(
        &mut self,
        characteristic: Characteristic,
        value: Bytes,
        with_ack: bool,
    ) -> Result<()>;

    /// Enable notifications, acknowledged with [`PeripheralEvent::SubscribeAck`]
    async fn subscribe(&mut self, characteristic: Characteristic) -> Result<()>;

    /// Drop the link
    async fn disconnect(&mut self) -> Result<()>;

    /// Human-readable identifier for logs
    fn identifier(&self) -> String;
}
