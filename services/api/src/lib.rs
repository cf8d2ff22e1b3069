//! Viva API Library Crate
//!
//! This library contains all the core logic for the Viva web service,
//! including the application state, session registry, API handlers, WebSocket
//! logic, and routing. The binaries under `bin/` are thin wrappers around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod router;
pub mod state;
pub mod ws;
