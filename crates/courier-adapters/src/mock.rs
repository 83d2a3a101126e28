// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock adapter simulating provider sends for local development and for
//! channels without real credentials configured.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use courier_core::{CourierError, Platform, SendReceipt, Sender};

/// Simulates a provider: short delay, synthetic provider id, structured log.
pub struct MockSender {
    platform: Platform,
    delay: Duration,
}

impl MockSender {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            delay: Duration::from_millis(100),
        }
    }

    /// Override the simulated network delay (tests use zero).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Sender for MockSender {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
    ) -> Result<SendReceipt, CourierError> {
        tokio::time::sleep(self.delay).await;

        let provider_id = format!(
            "mock-{}-{}",
            self.platform,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        info!(
            platform = %self.platform,
            to,
            subject,
            provider_id = provider_id.as_str(),
            "[MOCK] notification sent"
        );

        Ok(SendReceipt { provider_id })
    }
}
