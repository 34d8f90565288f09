//! Command-line interface for rate-limit-metrics
//!
//! Provides argument parsing and subcommand handling for the binary.

use crate::app::RateLimitApp;
use crate::config::Config;
use crate::error::AppResult;
use crate::metrics::{MetricsProvider, encode_text};
use clap::{Parser, Subcommand};
use prometheus::Registry;
use std::sync::Arc;

/// Prometheus instrumentation for a zone-based HTTP rate limiter
#[derive(Parser)]
#[command(name = "rate-limit-metrics")]
#[command(version)]
#[command(about = "Prometheus instrumentation for a zone-based HTTP rate limiter")]
#[command(
    long_about = "Inspects the metrics a rate-limit configuration produces: the registered \
    metric families and the one-shot configuration snapshot of every zone."
)]
pub struct Cli {
    /// Path to configuration file (.toml or .json)
    #[arg(short, long, default_value = "rate-limit.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Provision the configuration and print the resulting metrics
    Inspect,
}

/// Provision `config` into a fresh registry and render it as exposition text
pub fn inspect(config: Config) -> AppResult<String> {
    let registry = Registry::new();
    let provider = Arc::new(MetricsProvider::new());
    RateLimitApp::provision(Arc::new(config), provider, &registry)?;

    // Only the config snapshots exist at this point; request and key count
    // series appear once a limiter records into them
    encode_text(&registry)
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Rate Limit Configuration
# ========================

# ─────────────────────────────────────────────────────────────────────────────
# METRICS
# ─────────────────────────────────────────────────────────────────────────────

[metrics]
# Set to false to run the limiter without recording any metrics
enabled = true

# Emit per-key series next to the zone-level aggregates.
# Keys usually come from client data (addresses, tokens), so enabling this can
# create one time series per client. Leave off unless key cardinality is bounded.
include_key = false

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides this)
log_level = "info"

# ─────────────────────────────────────────────────────────────────────────────
# BACKGROUND REFRESH
# ─────────────────────────────────────────────────────────────────────────────

[refresh]
# How often caddy_rate_limit_keys_total is refreshed for each zone (1-3600)
key_count_interval_seconds = 10

# ─────────────────────────────────────────────────────────────────────────────
# ZONES
# ─────────────────────────────────────────────────────────────────────────────
#
# Zone fields:
#   - key: template identifying a client within the zone
#   - window: sliding window length (Go duration syntax: 500ms, 10s, 1m30s, 1h)
#   - max_events: requests allowed per key within one window

[zones.api]
key = "{http.request.remote.host}"
window = "10s"
max_events = 100

[zones.login]
key = "{http.request.remote.host}"
window = "1m"
max_events = 5
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::parse_from(["rate-limit-metrics"]);
        assert_eq!(cli.config, "rate-limit.toml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn custom_config_path() {
        let cli = Cli::parse_from(["rate-limit-metrics", "--config", "zones.json"]);
        assert_eq!(cli.config, "zones.json");
    }

    #[test]
    fn config_subcommand_with_output() {
        let cli = Cli::parse_from(["rate-limit-metrics", "config", "-o", "rl.toml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: Some(ref path) }) if path == "rl.toml"
        ));
    }

    #[test]
    fn inspect_subcommand() {
        let cli = Cli::parse_from(["rate-limit-metrics", "inspect", "-c", "x.toml"]);
        assert!(matches!(cli.command, Some(Command::Inspect)));
        assert_eq!(cli.config, "x.toml");
    }

    #[test]
    fn template_parses_as_valid_config() {
        let config =
            Config::from_toml_str(generate_config_template()).expect("template should be valid");
        assert_eq!(config.zones.len(), 2);
        assert!(!config.metrics.include_key);
    }

    #[test]
    fn inspect_renders_config_snapshots() {
        let config = Config::from_toml_str(generate_config_template()).expect("valid template");
        let output = inspect(config).expect("should inspect");

        assert!(output.contains("# TYPE caddy_rate_limit_config counter"));
        assert!(output.contains(r#"max_events="100""#));
        assert!(output.contains(r#"window="1m0s""#));
        assert!(!output.contains("caddy_rate_limit_keys_total"));
    }
}
