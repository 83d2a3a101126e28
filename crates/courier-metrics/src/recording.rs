// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording helpers over the metrics facade.
//!
//! Free functions so call sites stay one-liners; with no recorder installed
//! (unit tests) every call is a no-op.

use courier_core::Platform;

/// Register metric descriptions with the installed recorder.
pub fn register_metrics() {
    metrics::describe_counter!(
        "http_requests_total",
        "Total number of HTTP requests."
    );
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds."
    );
    metrics::describe_counter!(
        "messages_published_total",
        "Total number of dispatch events published to the broker."
    );
    metrics::describe_counter!(
        "messages_processed_total",
        "Total number of dispatch events processed by workers."
    );
}

/// Record one HTTP request with its latency.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

/// Record one dispatch event published to the broker.
pub fn record_message_published(platform: Platform) {
    metrics::counter!(
        "messages_published_total",
        "platform" => platform.to_string()
    )
    .increment(1);
}

/// Record one dispatch event processed by a worker.
pub fn record_message_processed(platform: Platform, result: &str) {
    metrics::counter!(
        "messages_processed_total",
        "platform" => platform.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}
