//! rate-limit-metrics - Prometheus instrumentation for a zone-based HTTP rate limiter
//!
//! Registers a fixed family of rate-limit metrics exactly once per process and
//! records request counts, declines, decision latency, per-zone key counts and
//! configuration snapshots, with per-key labels available as an opt-in.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod refresher;
pub mod telemetry;
pub mod window;
