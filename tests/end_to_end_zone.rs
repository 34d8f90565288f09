//! End-to-end test of the recording sequence a rate-limit handler performs
//!
//! A minimal fixed-window limiter stands in for the real sliding-window
//! algorithm. The handler records the request, decides, records the decline
//! if any, then records the decision time.

use prometheus::Registry;
use rate_limit_metrics::app::RateLimitApp;
use rate_limit_metrics::config::Config;
use rate_limit_metrics::metrics::{MetricsCollector, MetricsProvider, encode_text};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Counts events per key inside one fixed window
struct TestLimiter {
    max_events: u64,
    window: Duration,
    state: Mutex<HashMap<String, (Instant, u64)>>,
}

impl TestLimiter {
    fn new(max_events: u64, window: Duration) -> Self {
        Self {
            max_events,
            window,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn allow(&self, key: &str) -> bool {
        let mut state = self.state.lock().expect("lock");
        let now = Instant::now();
        let entry = state.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        if entry.1 < self.max_events {
            entry.1 += 1;
            true
        } else {
            false
        }
    }
}

/// Returns the HTTP status the handler would produce
fn handle(collector: Option<&MetricsCollector>, limiter: &TestLimiter, zone: &str, key: &str) -> u16 {
    let started = Instant::now();
    if let Some(c) = collector {
        c.record_request_for_key(zone, key);
    }

    let allowed = limiter.allow(key);
    if !allowed {
        if let Some(c) = collector {
            c.record_declined(zone, key);
        }
    }

    if let Some(c) = collector {
        c.record_process_time_for_key(started.elapsed(), zone, key);
    }

    if allowed { 200 } else { 429 }
}

const CONFIG: &str = r#"
[zones.test_zone]
key = "static"
window = "10s"
max_events = 2
"#;

#[test]
fn test_two_allowed_then_one_declined() {
    let config = Arc::new(Config::from_toml_str(CONFIG).expect("valid config"));
    let provider = Arc::new(MetricsProvider::new());
    let registry = Registry::new();
    let app = RateLimitApp::provision(Arc::clone(&config), Arc::clone(&provider), &registry)
        .expect("should provision");

    let zone = &config.zones["test_zone"];
    let limiter = TestLimiter::new(zone.max_events(), zone.window().as_duration());
    let collector = app.collector();

    let statuses: Vec<u16> = (0..3)
        .map(|_| handle(collector, &limiter, "test_zone", zone.key()))
        .collect();
    assert_eq!(statuses, vec![200, 200, 429]);

    let set = provider.instruments().expect("initialized");
    assert_eq!(
        set.config()
            .with_label_values(&["test_zone", "2", "10s"])
            .get(),
        1
    );
    // Declines are counted on top of requests, never subtracted
    assert_eq!(
        set.requests_total()
            .with_label_values(&["test_zone", ""])
            .get(),
        3
    );
    assert_eq!(
        set.declined_total()
            .with_label_values(&["test_zone", ""])
            .get(),
        1
    );
    assert_eq!(
        set.process_time()
            .with_label_values(&["test_zone", ""])
            .get_sample_count(),
        3
    );
    // include_key defaults to false, which only gates request and latency
    assert_eq!(
        set.requests_total()
            .with_label_values(&["test_zone", "static"])
            .get(),
        0
    );
    assert_eq!(
        set.declined_total()
            .with_label_values(&["test_zone", "static"])
            .get(),
        1
    );
}

#[test]
fn test_per_key_series_with_include_key() {
    let toml = format!("[metrics]\ninclude_key = true\n{}", CONFIG);
    let config = Arc::new(Config::from_toml_str(&toml).expect("valid config"));
    let provider = Arc::new(MetricsProvider::new());
    let registry = Registry::new();
    let app = RateLimitApp::provision(Arc::clone(&config), Arc::clone(&provider), &registry)
        .expect("should provision");

    let limiter = TestLimiter::new(2, Duration::from_secs(10));
    for _ in 0..3 {
        handle(app.collector(), &limiter, "test_zone", "static");
    }

    let output = encode_text(&registry).expect("should encode");
    let declined: Vec<&str> = output
        .lines()
        .filter(|l| l.starts_with("caddy_rate_limit_declined_requests_total{"))
        .collect();
    assert_eq!(declined.len(), 2, "aggregate and per-key series: {:?}", declined);
    assert!(declined.iter().any(|l| l.contains(r#"key="static""#)));
    assert!(declined.iter().any(|l| l.contains(r#"key="""#)));
}

#[test]
fn test_disabled_metrics_do_not_affect_decisions() {
    let toml = format!("[metrics]\nenabled = false\n{}", CONFIG);
    let config = Arc::new(Config::from_toml_str(&toml).expect("valid config"));
    let registry = Registry::new();
    let app = RateLimitApp::provision(config, Arc::new(MetricsProvider::new()), &registry)
        .expect("should provision");

    let limiter = TestLimiter::new(2, Duration::from_secs(10));
    let statuses: Vec<u16> = (0..3)
        .map(|_| handle(app.collector(), &limiter, "test_zone", "static"))
        .collect();

    assert_eq!(statuses, vec![200, 200, 429]);
    assert!(registry.gather().is_empty());
}
