//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the session registry and service clients.

use crate::config::Config;
use crate::registry::Registry;
use std::sync::Arc;
use viva_core::senior::SeniorAgent;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub senior: Arc<SeniorAgent>,
    pub config: Arc<Config>,
}
