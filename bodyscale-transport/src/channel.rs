//! Channel-backed peripheral
//!
//! Turns [`Peripheral`] calls into [`PeripheralRequest`] messages for
//! whatever task owns the radio (a platform Bluetooth binding, a simulator,
//! a test). The driver answers by sending [`PeripheralEvent`]s to the engine.
//!
//! [`PeripheralEvent`]: crate::PeripheralEvent

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use bodyscale_core::{Characteristic, Service};

use crate::{error::*, Peripheral};

/// A request for the radio driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralRequest {
    DiscoverServices,
    DiscoverCharacteristics(Service),
    Write {
        characteristic: Characteristic,
        value: Bytes,
        with_ack: bool,
    },
    Subscribe(Characteristic),
    Disconnect,
}

/// [`Peripheral`] that forwards every call over an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelPeripheral {
    name: String,
    requests: mpsc::Sender<PeripheralRequest>,
}

impl ChannelPeripheral {
    /// Create a peripheral and the receiving end for its driver
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<PeripheralRequest>) {
        let (requests, rx) = mpsc::channel(capacity);
        let peripheral = Self {
            name: name.into(),
            requests,
        };
        (peripheral, rx)
    }

    async fn send(&self, request: PeripheralRequest) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

#[async_trait]
impl Peripheral for ChannelPeripheral {
    async fn discover_services(&mut self) -> Result<()> {
        debug!("Discovering services on {}", self.name);
        self.send(PeripheralRequest::DiscoverServices).await
    }

    async fn discover_characteristics(&mut self, service: Service) -> Result<()> {
        debug!("Discovering characteristics of {:?} on {}", service, self.name);
        self.send(PeripheralRequest::DiscoverCharacteristics(service))
            .await
    }

    async fn write(
        &mut self,
        characteristic: Characteristic,
        value: Bytes,
        with_ack: bool,
    ) -> Result<()> {
        trace!(
            "Writing {} bytes to {}: {}",
            value.len(),
            characteristic,
            hex::encode_upper(&value)
        );
        self.send(PeripheralRequest::Write {
            characteristic,
            value,
            with_ack,
        })
        .await
    }

    async fn subscribe(&mut self, characteristic: Characteristic) -> Result<()> {
        debug!("Subscribing to {}", characteristic);
        self.send(PeripheralRequest::Subscribe(characteristic)).await
    }

    async fn disconnect(&mut self) -> Result<()> {
        debug!("Disconnecting from {}...", self.name);
        self.send(PeripheralRequest::Disconnect).await
    }

    fn identifier(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_requests_are_forwarded_in_order() {
        let (mut peripheral, mut rx) = ChannelPeripheral::new("scale", 8);

        peripheral.discover_services().await.unwrap();
        peripheral
            .subscribe(Characteristic::VendorNotify)
            .await
            .unwrap();
        peripheral
            .write(
                Characteristic::VendorWrite,
                Bytes::from_static(&[0x03, 0x00, 0x01, 0x04]),
                true,
            )
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(PeripheralRequest::DiscoverServices));
        assert_eq!(
            rx.recv().await,
            Some(PeripheralRequest::Subscribe(Characteristic::VendorNotify))
        );
        assert_eq!(
            rx.recv().await,
            Some(PeripheralRequest::Write {
                characteristic: Characteristic::VendorWrite,
                value: Bytes::from_static(&[0x03, 0x00, 0x01, 0x04]),
                with_ack: true,
            })
        );
    }

    #[tokio::test]
    async fn test_closed_driver() {
        let (mut peripheral, rx) = ChannelPeripheral::new("scale", 1);
        drop(rx);

        let result = peripheral.disconnect().await;
        assert_eq!(result, Err(Error::ChannelClosed));
        assert_eq!(peripheral.identifier(), "scale");
    }
}
