//! Prometheus metrics exposition
//!
//! Login metrics are emitted by `login-flow`. The bot adds its transport
//! metrics:
//!
//! - `bot_updates_total` (counter): label `action`
//! - `telegram_requests_total` (counter): labels `method`, `result`
//! - `telegram_request_duration_seconds` (histogram): label `method`
//! - `bot_delivery_failures_total` (counter): label `reply`

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const TELEGRAM_DURATION: &str = "telegram_request_duration_seconds";

/// Long polls hold the request open for up to 30 s, so the buckets reach past it.
const DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 40.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(TELEGRAM_DURATION.to_string()), DURATION_BUCKETS)
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record how an incoming update was routed.
pub fn record_update(action: &'static str) {
    metrics::counter!("bot_updates_total", "action" => action).increment(1);
}

/// Record a completed Bot API call.
pub fn record_telegram_request(method: &'static str, ok: bool, duration_secs: f64) {
    let result = if ok { "ok" } else { "error" };
    metrics::counter!("telegram_requests_total", "method" => method, "result" => result)
        .increment(1);
    metrics::histogram!(TELEGRAM_DURATION, "method" => method).record(duration_secs);
}

/// Record a reply that could not be delivered.
pub fn record_delivery_failure(reply: &'static str) {
    metrics::counter!("bot_delivery_failures_total", "reply" => reply).increment(1);
}
