//! Instrument definitions and registration

use super::{
    CONFIG, DECLINED_REQUESTS_TOTAL, KEYS_TOTAL, NAMESPACE, PROCESS_TIME_BUCKETS,
    PROCESS_TIME_SECONDS, REQUESTS_TOTAL, SUBSYSTEM,
};
use prometheus::core::Collector;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

/// The fixed set of rate-limit instruments
///
/// Handles are cheap to clone and safe to share; only their internal values
/// change after registration.
#[derive(Clone)]
pub struct InstrumentSet {
    declined_total: IntCounterVec,
    requests_total: IntCounterVec,
    process_time: HistogramVec,
    keys_total: IntGaugeVec,
    config: IntCounterVec,
}

impl InstrumentSet {
    /// Create all five instruments and register them with `registry`
    ///
    /// # Errors
    ///
    /// Returns an error if an instrument definition is invalid or a metric
    /// with the same name is already registered. Registration is all or
    /// nothing: on failure none of the five instruments stay in `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        // Counter: requests declined with 429
        //
        // Labels: zone, key ("" = zone aggregate)
        let declined_total = IntCounterVec::new(
            Opts::new(
                DECLINED_REQUESTS_TOTAL,
                "Total number of requests for which rate limit was applied (Declined with HTTP 429 status code returned).",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
            &["zone", "key"],
        )?;

        // Counter: every request seen by the limiter, declined or not
        let requests_total = IntCounterVec::new(
            Opts::new(
                REQUESTS_TOTAL,
                "Total number of requests that passed through Rate Limit module (both declined & processed).",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
            &["zone", "key"],
        )?;

        // Histogram: decision latency in seconds
        let process_time = HistogramVec::new(
            HistogramOpts::new(
                PROCESS_TIME_SECONDS,
                "A time taken to process rate limiting for each request.",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM)
            .buckets(PROCESS_TIME_BUCKETS.to_vec()),
            &["zone", "key"],
        )?;

        // Gauge: tracked keys per zone, set by the background refresher
        let keys_total = IntGaugeVec::new(
            Opts::new(
                KEYS_TOTAL,
                "Total number of keys that each RL zone contains. (This metric is collected in the background for each zone.)",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
            &["zone"],
        )?;

        // Counter: one series per distinct zone configuration, bumped per provisioning
        let config = IntCounterVec::new(
            Opts::new(
                CONFIG,
                "Shows configuration of the rate limiter module. Reported only once on bootstrap as configuration is not dynamically configurable.",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
            &["zone", "max_events", "window"],
        )?;

        register_all(registry, || {
            vec![
                Box::new(declined_total.clone()) as Box<dyn Collector>,
                Box::new(requests_total.clone()) as Box<dyn Collector>,
                Box::new(process_time.clone()) as Box<dyn Collector>,
                Box::new(keys_total.clone()) as Box<dyn Collector>,
                Box::new(config.clone()) as Box<dyn Collector>,
            ]
        })?;

        Ok(Self {
            declined_total,
            requests_total,
            process_time,
            keys_total,
            config,
        })
    }

    pub fn declined_total(&self) -> &IntCounterVec {
        &self.declined_total
    }

    pub fn requests_total(&self) -> &IntCounterVec {
        &self.requests_total
    }

    pub fn process_time(&self) -> &HistogramVec {
        &self.process_time
    }

    pub fn keys_total(&self) -> &IntGaugeVec {
        &self.keys_total
    }

    pub fn config(&self) -> &IntCounterVec {
        &self.config
    }
}

/// Register every collector or none of them
///
/// `collectors` is called again on failure to unregister the ones that were
/// already added.
fn register_all<F>(registry: &Registry, collectors: F) -> Result<(), prometheus::Error>
where
    F: Fn() -> Vec<Box<dyn Collector>>,
{
    for (index, collector) in collectors().into_iter().enumerate() {
        if let Err(e) = registry.register(collector) {
            for registered in collectors().into_iter().take(index) {
                if let Err(rollback) = registry.unregister(registered) {
                    tracing::warn!(error = %rollback, "Failed to roll back metric registration");
                }
            }
            return Err(e);
        }
    }
    Ok(())
}
