// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the Courier dispatch service.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The recorder is
//! installed once in the binary; collected metrics render as Prometheus text
//! via [`PrometheusMetrics::render`], exposed by the gateway's `/metrics`
//! endpoint.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use courier_core::CourierError;

pub use recording::{
    record_http_request, record_message_processed, record_message_published, register_metrics,
};

/// Owns the installed Prometheus recorder.
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    /// Install the Prometheus recorder globally. Only one recorder can be
    /// installed per process; a second call returns an error.
    pub fn new() -> Result<Self, CourierError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            CourierError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Get a clone of the handle for rendering elsewhere.
    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Platform;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        // No recorder installed in unit tests; calls must not panic.
        record_http_request("POST", "/api/v1/messages/send", 201, 0.012);
        record_message_published(Platform::Sms);
        record_message_processed(Platform::Email, "success");
    }
}
