//! Protocol modules.
//!
//! A wire frame is a JSON `Batch` holding one or more operation-tagged
//! `Envelope`s. Envelope payloads stay as raw JSON until a consumer asks for a
//! specific shape.
//!
//! All decoding is panic-free: malformed input is reported as `WssError`.

pub mod envelope;
pub mod ops;
pub mod payload;

pub use envelope::{Batch, Envelope};
pub use payload::{AccessToken, DeviceLoginRequest, DeviceLoginResponse, FailedOperation, Payload};
