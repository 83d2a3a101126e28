// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capturing sender for deterministic worker and pipeline tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{CourierError, Platform, SendReceipt, Sender};

/// One captured send call.
#[derive(Debug, Clone)]
pub struct CapturedSend {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub provider_id: String,
}

/// A [`Sender`] that records every call and can be told to fail.
///
/// Provider ids are deterministic (`test-<platform>-<n>`) so tests can
/// correlate webhook callbacks without parsing logs.
pub struct CapturingSender {
    platform: Platform,
    sent: Arc<Mutex<Vec<CapturedSend>>>,
    counter: AtomicU64,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl CapturingSender {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            sent: Arc::new(Mutex::new(Vec::new())),
            counter: AtomicU64::new(0),
            fail_with: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every subsequent send fail with the given message.
    pub async fn fail_with(&self, message: &str) {
        *self.fail_with.lock().await = Some(message.to_string());
    }

    /// Restore normal behavior after [`CapturingSender::fail_with`].
    pub async fn succeed(&self) {
        *self.fail_with.lock().await = None;
    }

    /// All captured sends, in call order.
    pub async fn sent(&self) -> Vec<CapturedSend> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl Sender for CapturingSender {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn send(&self, to: &str, subject: &str, body: &str)
        -> Result<SendReceipt, CourierError> {
        if let Some(message) = self.fail_with.lock().await.clone() {
            return Err(CourierError::Adapter {
                message,
                source: None,
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let provider_id = format!("test-{}-{n}", self.platform);
        self.sent.lock().await.push(CapturedSend {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            provider_id: provider_id.clone(),
        });

        Ok(SendReceipt { provider_id })
    }
}
