//! HTTP and WebSocket server for the Lets Talk messaging backend.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
