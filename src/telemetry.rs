//! Telemetry and observability setup
//!
//! Configures structured logging with tracing and tracing-subscriber.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initialize tracing subscriber for structured logging
///
/// Only the first call per process has any effect. If the host already
/// installed a global subscriber, that subscriber is kept.
///
/// Reads log level from RUST_LOG environment variable, defaulting to the
/// level specified in config (or "info" if not set).
///
/// # Examples
///
/// ```no_run
/// rate_limit_metrics::telemetry::init("info");
/// tracing::info!("Rate limiter started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));

        // A host process may already own the global subscriber
        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
        {
            tracing::debug!(error = %e, "Keeping existing tracing subscriber");
        }
    });
}

fn default_filter(default_level: &str) -> String {
    format!("rate_limit_metrics={}", default_level)
}
