//! # bodyscale
//!
//! Protocol engine for Bluetooth body-composition scales.
//!
//! ## Features
//!
//! - Weight and body-composition frame decoding, including multi-packet
//!   reassembly
//! - The seven-step bring-up: subscriptions, unit selection, user
//!   registration and consent, body metadata
//! - Registration recovery through a one-shot delete-all-users
//! - Debounced, throttled weight announcements
//! - Async/await API using Tokio, independent of the Bluetooth stack
//!
//! ## Quick Start
//!
//! ```no_run
//! use bodyscale::{
//!     ChannelPeripheral, EngineConfig, JsonFileProfileStore, ScaleEngine, ScaleEvent,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> bodyscale::Result<()> {
//!     // Requests go to the radio driver, its events come back on `radio_events`
//!     let (peripheral, _requests) = ChannelPeripheral::new("scale", 32);
//!     let (_radio, radio_events) = mpsc::channel(32);
//!
//!     let store = JsonFileProfileStore::new("profile.json");
//!     let (engine, mut events) =
//!         ScaleEngine::new(EngineConfig::default(), peripheral, store, radio_events)?;
//!     tokio::spawn(engine.run());
//!
//!     while let Some(event) = events.recv().await {
//!         if let ScaleEvent::WeightMeasured(m) = event {
//!             println!("{}", m);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod store;

// Re-exports
pub use config::EngineConfig;
pub use engine::{ProfileEdit, ScaleEngine, ScaleHandle};
pub use error::{Error, Result};
pub use event::ScaleEvent;
pub use store::{JsonFileProfileStore, MemoryProfileStore, ProfileStore};

// Re-export protocol and transport types
pub use bodyscale_core::{Characteristic, Command, Service};
pub use bodyscale_transport::{
    AdapterState, ChannelPeripheral, Peripheral, PeripheralEvent, PeripheralRequest,
};
pub use bodyscale_types::{Gender, MassUnit, Measurement, UnitSystem, UserProfile};
