//! Prometheus instrumentation for the rate limiter
//!
//! This module provides the fixed family of rate-limit measurements:
//! - Requests passing through the limiter, by zone and (optionally) key
//! - Requests declined with HTTP 429, by zone and (optionally) key
//! - Decision latency histogram
//! - Number of tracked keys per zone (refreshed in the background)
//! - A one-shot snapshot of each zone's configuration
//!
//! Instruments are registered once per process through a [`MetricsProvider`]
//! and written through a [`MetricsCollector`]. The registry itself belongs to
//! the host process; this module never serves or exports it.
//!
//! # Label Cardinality
//!
//! Every zone-scoped observation is written with an empty `key` label, which
//! is the bounded zone-level aggregate. When `include_key` is enabled, a second
//! observation carries the real key. Keys usually derive from client data
//! (addresses, tokens), so per-key series are opt-in.

mod collector;
mod instruments;
mod provider;

pub use collector::{DecisionTimer, MetricsCollector};
pub use instruments::InstrumentSet;
pub use provider::MetricsProvider;

use crate::error::{AppError, AppResult};
use prometheus::{Encoder, Registry, TextEncoder};

/// Metric namespace shared with the Caddy rate-limit module
pub const NAMESPACE: &str = "caddy";

/// Metric subsystem shared with the Caddy rate-limit module
pub const SUBSYSTEM: &str = "rate_limit";

pub const DECLINED_REQUESTS_TOTAL: &str = "declined_requests_total";
pub const REQUESTS_TOTAL: &str = "requests_total";
pub const PROCESS_TIME_SECONDS: &str = "process_time_seconds";
pub const KEYS_TOTAL: &str = "keys_total";
pub const CONFIG: &str = "config";

/// Process time histogram buckets in seconds (1ms to 1s)
pub const PROCESS_TIME_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// `key` label value used for zone-level aggregates
pub const AGGREGATE_KEY: &str = "";

/// `zone` label value for requests that matched no zone
pub const NO_ZONE: &str = "";

/// `zone` label value for requests that matched a zone not yet resolved to a name
pub const ANY_ZONE: &str = "*";

/// Fully qualified metric name (`caddy_rate_limit_<name>`)
pub fn full_name(name: &str) -> String {
    format!("{}_{}_{}", NAMESPACE, SUBSYSTEM, name)
}

/// Gather all metrics from `registry` and encode them in Prometheus text format
///
/// # Errors
///
/// Returns [`AppError::Encode`] if the encoder fails or produces invalid UTF-8.
pub fn encode_text(registry: &Registry) -> AppResult<String> {
    let metric_families = registry.gather();
    let metric_count = metric_families.len();

    tracing::debug!(
        metric_family_count = metric_count,
        "Encoding metrics to Prometheus text format"
    );

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|e| {
            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                "Prometheus text encoder failed"
            );
            AppError::Encode(format!(
                "failed to encode {} metric families: {}",
                metric_count, e
            ))
        })?;

    String::from_utf8(buffer).map_err(|e| {
        AppError::Encode(format!(
            "encoder produced invalid UTF-8 at byte {}",
            e.utf8_error().valid_up_to()
        ))
    })
}
