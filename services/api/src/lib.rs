//! Slate API Library Crate
//!
//! This library contains all the logic for the Slate web service: the
//! application state, capability gateways, module/session registries, API
//! handlers, WebSocket logic, and routing. The `api` binary is a thin
//! wrapper around this library.

pub mod config;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod router;
pub mod state;
pub mod ws;
