// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API gateway for the Courier dispatch service.
//!
//! Message endpoints under `/api/v1` behind API-key auth and per-user rate
//! limiting, unauthenticated provider webhooks, and the health/metrics/
//! version surface.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod ratelimit;
pub mod server;
pub mod webhooks;

pub use error::ApiError;
pub use ratelimit::{MemoryCounterStore, RateLimitState};
pub use server::{build_router, start_server, GatewayState, HealthState};
