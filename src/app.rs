//! Rate-limit module wiring
//!
//! Provisions metrics for a loaded [`Config`]: registers the instruments once,
//! records each zone's config snapshot once per provisioning and owns the per-zone key count
//! refreshers between `start` and `stop`.

use crate::config::Config;
use crate::error::AppResult;
use crate::metrics::{MetricsCollector, MetricsProvider};
use crate::refresher::{KeyCountRefresher, KeyCountSource};
use prometheus::Registry;
use std::sync::Arc;

/// A provisioned rate-limit module instance
pub struct RateLimitApp {
    config: Arc<Config>,
    collector: Option<MetricsCollector>,
    refreshers: Vec<KeyCountRefresher>,
}

impl RateLimitApp {
    /// Provision metrics for `config`
    ///
    /// Registration against `registry` only happens the first time `provider`
    /// is initialized; reprovisioning reuses the existing instruments.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry rejects the instruments.
    pub fn provision(
        config: Arc<Config>,
        provider: Arc<MetricsProvider>,
        registry: &Registry,
    ) -> AppResult<Self> {
        if !config.metrics.enabled {
            tracing::info!("Rate limit metrics disabled by configuration");
            return Ok(Self {
                config,
                collector: None,
                refreshers: Vec::new(),
            });
        }

        provider.initialize(registry)?;
        let collector = MetricsCollector::new(provider, config.metrics.include_key);

        for (zone, zone_config) in &config.zones {
            collector.record_config(zone, zone_config.max_events(), zone_config.window());
            tracing::info!(
                zone = %zone,
                max_events = zone_config.max_events(),
                window = %zone_config.window(),
                "Provisioned rate limit zone"
            );
        }

        Ok(Self {
            config,
            collector: Some(collector),
            refreshers: Vec::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Collector for request handling, `None` when metrics are disabled
    pub fn collector(&self) -> Option<&MetricsCollector> {
        self.collector.as_ref()
    }

    pub fn is_running(&self) -> bool {
        !self.refreshers.is_empty()
    }

    /// Spawn one key count refresher per zone
    ///
    /// Does nothing if already running or if metrics are disabled. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self, source: Arc<dyn KeyCountSource>) {
        let Some(collector) = &self.collector else {
            return;
        };
        if self.is_running() {
            tracing::debug!("Key count refreshers already running");
            return;
        }

        let interval = self.config.refresh.key_count_interval();
        self.refreshers = self
            .config
            .zones
            .keys()
            .map(|zone| {
                KeyCountRefresher::spawn(
                    collector.clone(),
                    zone.clone(),
                    Arc::clone(&source),
                    interval,
                )
            })
            .collect();
    }

    /// Stop all refreshers and wait for them to exit
    pub async fn stop(&mut self) {
        for refresher in self.refreshers.drain(..) {
            refresher.shutdown().await;
        }
    }
}
