//! SoilSense API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! WebSocket infrastructure, notification routing) so integration tests
//! and the binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod notifications;
pub mod router;
pub mod routes;
pub mod services;
pub mod state;
pub mod ws;
