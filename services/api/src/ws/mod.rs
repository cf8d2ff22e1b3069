//! WebSocket Session Management
//!
//! This module contains the core logic for running live interview calls over
//! WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON frame formats for the telephony media
//!   stream and the observer feed.
//! - `model`: Typed client for the upstream realtime voice session.
//! - `bridge`: The per-call event loop mediating transport, model, and
//!   oversight.
//! - `session`: Manages the media-stream connection lifecycle, from
//!   handshake to teardown.
//! - `observe`: The read-only observer feed.

mod bridge;
pub mod model;
mod observe;
pub mod protocol;
pub mod session;

pub use observe::observe_handler;
pub use session::media_stream_handler;
