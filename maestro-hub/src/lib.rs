//! Maestro hub server library.
//!
//! Exposes the relay hub for use in tests and embedding. The hub accepts
//! WebSocket connections, assigns each one a session identity, and routes
//! opaque payloads between the active master and its clients.

pub mod config;
pub mod hub;
pub mod registry;
pub mod roles;
pub mod router;
