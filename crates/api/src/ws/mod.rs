//! WebSocket infrastructure for real-time job updates.
//!
//! Provides connection and group management, heartbeat monitoring, the
//! inbound frame types and the HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod manager;
pub mod messages;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use messages::ClientMessage;
