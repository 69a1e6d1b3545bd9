//! Dispatcher module exports.
//!
//! Re-exports the dispatcher, its pending-wait handle and the correlation
//! table so downstream consumers can depend on this module directly.

pub mod dispatcher;
pub mod table;

pub use dispatcher::{DisconnectReport, Dispatcher, PendingHandle, ReconnectOutcome};
pub use table::CorrelationTable;
