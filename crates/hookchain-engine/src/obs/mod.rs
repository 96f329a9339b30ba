//! Lightweight in-process metrics.
//!
//! Counters and gauges are stored as atomics keyed by label sets and rendered
//! in Prometheus text format by [`metrics::EngineMetrics::render`].

pub mod metrics;
