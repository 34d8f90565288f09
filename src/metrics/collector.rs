//! Recording façade used on the request path

use super::{AGGREGATE_KEY, ANY_ZONE, InstrumentSet, MetricsProvider, NO_ZONE};
use crate::window::Window;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Records rate-limit events against the shared instruments
///
/// A collector carries the `include_key` policy of one configuration scope.
/// Every operation is a silent no-op until the provider is initialized, and
/// none of them can fail or block. A disabled limiter holds no collector at
/// all (`Option<MetricsCollector>`).
#[derive(Clone)]
pub struct MetricsCollector {
    provider: Arc<MetricsProvider>,
    include_key: bool,
}

impl MetricsCollector {
    pub fn new(provider: Arc<MetricsProvider>, include_key: bool) -> Self {
        Self {
            provider,
            include_key,
        }
    }

    /// Whether per-key series are written in addition to zone aggregates
    pub fn include_key(&self) -> bool {
        self.include_key
    }

    /// Count a request before its zone and key are resolved
    ///
    /// Matched requests land on `{zone="*", key=""}` and unmatched ones on
    /// `{zone="", key=""}`.
    pub fn record_request(&self, has_zone: bool) {
        let Some(set) = self.instruments() else {
            return;
        };
        set.requests_total()
            .with_label_values(&[zone_class(has_zone), AGGREGATE_KEY])
            .inc();
    }

    /// Count a request for a resolved zone and key
    pub fn record_request_for_key(&self, zone: &str, key: &str) {
        let Some(set) = self.instruments() else {
            return;
        };
        for_each_series(zone, key, self.include_key, |labels| {
            set.requests_total().with_label_values(labels).inc();
        });
    }

    /// Count a request declined with HTTP 429
    ///
    /// Declines are counted in addition to the request itself, which was
    /// already recorded by [`record_request_for_key`](Self::record_request_for_key).
    /// The per-key decline series is written regardless of `include_key`.
    pub fn record_declined(&self, zone: &str, key: &str) {
        let Some(set) = self.instruments() else {
            return;
        };
        for_each_series(zone, key, true, |labels| {
            set.declined_total().with_label_values(labels).inc();
        });
    }

    /// Observe decision latency before the zone and key are resolved
    pub fn record_process_time(&self, duration: Duration, has_zone: bool) {
        let Some(set) = self.instruments() else {
            return;
        };
        set.process_time()
            .with_label_values(&[zone_class(has_zone), AGGREGATE_KEY])
            .observe(duration.as_secs_f64());
    }

    /// Observe decision latency for a resolved zone and key
    pub fn record_process_time_for_key(&self, duration: Duration, zone: &str, key: &str) {
        let Some(set) = self.instruments() else {
            return;
        };
        let seconds = duration.as_secs_f64();
        for_each_series(zone, key, self.include_key, |labels| {
            set.process_time().with_label_values(labels).observe(seconds);
        });
    }

    /// Set the number of keys tracked by `zone`
    ///
    /// Absolute set, last writer wins. Callers keep one refresher per zone.
    pub fn update_key_count(&self, zone: &str, count: i64) {
        let Some(set) = self.instruments() else {
            return;
        };
        set.keys_total().with_label_values(&[zone]).set(count);
    }

    /// Publish a zone's configuration as `{zone, max_events, window}`
    ///
    /// Every call increments the series; callers record each zone once per
    /// provisioning. A changed configuration lands on a new series.
    pub fn record_config(&self, zone: &str, max_events: u64, window: Window) {
        let Some(set) = self.instruments() else {
            return;
        };
        let max_events = max_events.to_string();
        let window = window.to_string();
        set.config()
            .with_label_values(&[zone, max_events.as_str(), window.as_str()])
            .inc();
    }

    /// Start timing a rate-limit decision
    pub fn start_decision(&self) -> DecisionTimer<'_> {
        DecisionTimer {
            collector: self,
            started: Instant::now(),
        }
    }

    fn instruments(&self) -> Option<&Arc<InstrumentSet>> {
        self.provider.instruments()
    }
}

/// Apply `record` to the zone aggregate and, if `per_key`, the per-key series
///
/// An empty key is the aggregate itself and is never written twice.
fn for_each_series<F>(zone: &str, key: &str, per_key: bool, mut record: F)
where
    F: FnMut(&[&str]),
{
    record(&[zone, AGGREGATE_KEY]);
    if per_key && key != AGGREGATE_KEY {
        record(&[zone, key]);
    }
}

fn zone_class(has_zone: bool) -> &'static str {
    if has_zone { ANY_ZONE } else { NO_ZONE }
}

/// Measures one rate-limit decision
///
/// Obtained from [`MetricsCollector::start_decision`]. Dropping the timer
/// without finishing it records nothing.
#[must_use = "a decision timer records nothing until finished"]
pub struct DecisionTimer<'a> {
    collector: &'a MetricsCollector,
    started: Instant,
}

impl DecisionTimer<'_> {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record the elapsed time against `zone` and `key`
    pub fn finish(self, zone: &str, key: &str) -> Duration {
        let elapsed = self.elapsed();
        self.collector.record_process_time_for_key(elapsed, zone, key);
        elapsed
    }

    /// Record the elapsed time for a request that matched no zone
    pub fn finish_unmatched(self) -> Duration {
        let elapsed = self.elapsed();
        self.collector.record_process_time(elapsed, false);
        elapsed
    }
}
