//! Integration tests for the zone aggregate / per-key label policy
//!
//! The zone aggregate (`key=""`) is always written. Per-key request and
//! latency series are only written when `include_key` is enabled; the
//! per-key decline series is always written.

use proptest::prelude::*;
use prometheus::Registry;
use rate_limit_metrics::metrics::{InstrumentSet, MetricsCollector, MetricsProvider};
use std::sync::Arc;
use std::time::Duration;

fn setup(include_key: bool) -> (MetricsCollector, Arc<InstrumentSet>) {
    let provider = Arc::new(MetricsProvider::new());
    let set = provider
        .initialize(&Registry::new())
        .expect("should initialize");
    (MetricsCollector::new(provider, include_key), set)
}

#[test]
fn test_policy_disabled_leaves_per_key_request_series_at_zero() {
    let (collector, set) = setup(false);

    collector.record_request_for_key("z", "k");
    collector.record_declined("z", "k");
    collector.record_process_time_for_key(Duration::from_millis(2), "z", "k");

    assert_eq!(set.requests_total().with_label_values(&["z", ""]).get(), 1);
    assert_eq!(set.requests_total().with_label_values(&["z", "k"]).get(), 0);
    assert_eq!(set.declined_total().with_label_values(&["z", ""]).get(), 1);
    assert_eq!(set.declined_total().with_label_values(&["z", "k"]).get(), 1);
    assert_eq!(
        set.process_time()
            .with_label_values(&["z", ""])
            .get_sample_count(),
        1
    );
    assert_eq!(
        set.process_time()
            .with_label_values(&["z", "k"])
            .get_sample_count(),
        0
    );
}

#[test]
fn test_policy_enabled_writes_both_series() {
    let (collector, set) = setup(true);

    collector.record_request_for_key("z", "k");
    collector.record_declined("z", "k");
    collector.record_process_time_for_key(Duration::from_millis(2), "z", "k");

    assert_eq!(set.requests_total().with_label_values(&["z", ""]).get(), 1);
    assert_eq!(set.requests_total().with_label_values(&["z", "k"]).get(), 1);
    assert_eq!(set.declined_total().with_label_values(&["z", ""]).get(), 1);
    assert_eq!(set.declined_total().with_label_values(&["z", "k"]).get(), 1);
    assert_eq!(
        set.process_time()
            .with_label_values(&["z", "k"])
            .get_sample_count(),
        1
    );
}

#[test]
fn test_collectors_with_different_policies_share_instruments() {
    let provider = Arc::new(MetricsProvider::new());
    let set = provider
        .initialize(&Registry::new())
        .expect("should initialize");

    let detailed = MetricsCollector::new(Arc::clone(&provider), true);
    let aggregate_only = MetricsCollector::new(Arc::clone(&provider), false);

    detailed.record_request_for_key("z", "a");
    aggregate_only.record_request_for_key("z", "b");

    assert_eq!(set.requests_total().with_label_values(&["z", ""]).get(), 2);
    assert_eq!(set.requests_total().with_label_values(&["z", "a"]).get(), 1);
    assert_eq!(set.requests_total().with_label_values(&["z", "b"]).get(), 0);
}

#[test]
fn test_labels_are_not_normalized() {
    let (collector, set) = setup(true);

    collector.record_request_for_key("", "Client 10.0.0.1 ");

    assert_eq!(set.requests_total().with_label_values(&["", ""]).get(), 1);
    assert_eq!(
        set.requests_total()
            .with_label_values(&["", "Client 10.0.0.1 "])
            .get(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_recording_loses_no_increments() {
    let (collector, set) = setup(true);

    let tasks = (0..8).map(|i| {
        let collector = collector.clone();
        tokio::spawn(async move {
            let key = format!("client-{}", i % 2);
            for _ in 0..500 {
                collector.record_request_for_key("z", &key);
            }
        })
    });
    for result in futures::future::join_all(tasks).await {
        result.expect("task should not panic");
    }

    assert_eq!(set.requests_total().with_label_values(&["z", ""]).get(), 4000);
    assert_eq!(
        set.requests_total()
            .with_label_values(&["z", "client-0"])
            .get(),
        2000
    );
    assert_eq!(
        set.requests_total()
            .with_label_values(&["z", "client-1"])
            .get(),
        2000
    );
}

proptest! {
    #[test]
    fn prop_aggregate_counts_every_request(
        include_key in any::<bool>(),
        keys in prop::collection::vec("[a-z0-9]{1,8}", 1..50),
    ) {
        let (collector, set) = setup(include_key);
        for key in &keys {
            collector.record_request_for_key("z", key);
        }

        prop_assert_eq!(
            set.requests_total().with_label_values(&["z", ""]).get(),
            keys.len() as u64
        );

        let per_key_total: u64 = {
            let mut unique = keys.clone();
            unique.sort();
            unique.dedup();
            unique
                .iter()
                .map(|k| set.requests_total().with_label_values(&["z", k.as_str()]).get())
                .sum()
        };
        let expected = if include_key { keys.len() as u64 } else { 0 };
        prop_assert_eq!(per_key_total, expected);
    }
}
