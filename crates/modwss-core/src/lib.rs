//! modwss core: transport-agnostic protocol primitives and the shared error type.
//!
//! This crate defines the wire-level contracts (operation-tagged envelopes
//! batched into frames, typed payloads) and the error surface shared by the
//! client runtime and anything built on top of it. It carries no socket or
//! runtime dependencies so it can be reused by tooling and test servers.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed frames and mismatched payload shapes surface as `WssError`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, Result, WssError};
