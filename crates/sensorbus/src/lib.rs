//! Sensor bus client library.
//!
//! The orchestrator only sees the [`SensorBus`] capability: publish a
//! payload on a topic, and receive every inbound message. Two
//! implementations are provided:
//!
//! - [`GatewayManager`]: persistent WebSocket connection to a sensor
//!   gateway, with typed frames, reconnection and resubscription.
//! - [`MemorySensorBus`]: in-process loopback for tests and local runs.

pub mod bus;
pub mod client;
pub mod manager;
pub mod memory;
pub mod messages;
pub mod processor;
pub mod reconnect;

pub use bus::{BusMessage, SensorBus, SensorBusError};
pub use manager::GatewayManager;
pub use memory::MemorySensorBus;
