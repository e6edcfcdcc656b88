//! Delivery of orchestrator notifications to WebSocket observers.

mod router;

pub use router::NotificationRouter;
