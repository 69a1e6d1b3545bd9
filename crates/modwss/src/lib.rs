//! Top-level facade crate for modwss.
//!
//! Re-exports core types and the client library so users can depend on a single crate.

pub mod core {
    pub use modwss_core::*;
}

pub mod client {
    pub use modwss_client::*;
}
