//! WebSocket Session Management
//!
//! This module contains the real-time surface of the service:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle, session turns,
//!   and background module generation.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
