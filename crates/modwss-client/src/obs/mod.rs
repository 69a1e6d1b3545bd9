//! Lightweight in-process metrics (no metrics crate).
//!
//! Counters and histograms are stored as atomics in `DashMap`s and rendered in
//! Prometheus text format by `Dispatcher::render_metrics`, so a host game can
//! surface them in its own diagnostics.

pub mod metrics;

pub use metrics::WssMetrics;
