// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for outbound delivery channels.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::Platform;

/// Provider acknowledgement of an accepted send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Opaque identifier minted by the provider. Stable, globally unique
    /// within that provider, and the correlation key for later webhooks.
    pub provider_id: String,
}

/// Adapter that translates an internal send into one external provider call.
///
/// Implementations bound their own HTTP timeouts; cancellation propagates by
/// dropping the in-flight future.
#[async_trait]
pub trait Sender: Send + Sync {
    /// The channel this adapter delivers on.
    fn platform(&self) -> Platform;

    /// Deliver one notification to `to`. An error is terminal for the
    /// recipient in the current design: the worker marks it failed and does
    /// not requeue.
    async fn send(&self, to: &str, subject: &str, body: &str)
        -> Result<SendReceipt, CourierError>;
}
