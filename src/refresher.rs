//! Background refresh of the per-zone key count gauge
//!
//! The limiter owns its key state; this module only polls it. One
//! [`KeyCountRefresher`] runs per zone so that gauge writes for a zone are
//! never concurrent.

use crate::error::AppResult;
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Source of the number of keys currently tracked by a zone
///
/// Implemented by the rate limiter. Distributed implementations may query a
/// remote store, hence the async signature.
#[async_trait]
pub trait KeyCountSource: Send + Sync {
    async fn key_count(&self, zone: &str) -> AppResult<u64>;
}

/// Periodically copies a zone's key count into `keys_total{zone}`
pub struct KeyCountRefresher {
    zone: String,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyCountRefresher {
    /// Spawn the refresh task on the current tokio runtime
    ///
    /// The first refresh happens immediately, then once per `interval`. If
    /// the source fails, the gauge keeps its previous value until the next
    /// successful refresh.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime or if `interval` is zero.
    pub fn spawn(
        collector: MetricsCollector,
        zone: impl Into<String>,
        source: Arc<dyn KeyCountSource>,
        interval: Duration,
    ) -> Self {
        let zone = zone.into();
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task_zone = zone.clone();
        let handle = tokio::spawn(async move {
            tracing::info!(
                zone = %task_zone,
                interval_ms = interval.as_millis() as u64,
                "Starting key count refresher"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        refresh_once(&collector, &task_zone, source.as_ref()).await;
                    }
                    // Err means the refresher handle was dropped
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!(zone = %task_zone, "Key count refresher stopped");
        });

        Self {
            zone,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(
                    zone = %self.zone,
                    error = %e,
                    "Key count refresher panicked"
                );
            }
        }
    }
}

impl Drop for KeyCountRefresher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Query `source` once and publish the result
pub async fn refresh_once(collector: &MetricsCollector, zone: &str, source: &dyn KeyCountSource) {
    match source.key_count(zone).await {
        Ok(count) => {
            let count = i64::try_from(count).unwrap_or(i64::MAX);
            collector.update_key_count(zone, count);
            tracing::trace!(zone = %zone, count, "Refreshed key count");
        }
        Err(e) => {
            tracing::warn!(
                zone = %zone,
                error = %e,
                "Failed to read key count, keeping previous value"
            );
        }
    }
}
