//! modwss client library entry.
//!
//! This crate wires the config loader, the WebSocket connection manager, the
//! operation-tag dispatcher and the device-login flow into one client stack.
//! It is consumed by the demo binary (`main.rs`), by the facade crate and by
//! integration tests.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod obs;
pub mod transport;

pub use auth::{DeviceLogin, DeviceLoginToken};
pub use config::WssConfig;
pub use dispatch::Dispatcher;
