// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter store trait backing the fixed-window rate limiter.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CourierError;

/// A key/value counter with atomic increment and TTL semantics.
///
/// This is the interface an external store (Redis-style) would satisfy; the
/// in-process implementation lives in the gateway crate. Callers treat errors
/// as advisory and fail open.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter at `key`, returning the new value.
    async fn increment(&self, key: &str) -> Result<u64, CourierError>;

    /// Arrange for `key` to expire after `ttl`. Called once per window, on
    /// the first increment.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CourierError>;
}
