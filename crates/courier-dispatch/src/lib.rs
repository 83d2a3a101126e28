// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Courier dispatch pipeline: transactional ingest, per-channel
//! workers, and the scheduled-message release loop.
//!
//! All three share one state machine and one correctness contract:
//! at-least-once delivery with idempotent, monotone status transitions.

pub mod scheduler;
pub mod service;
pub mod worker;

pub use scheduler::Scheduler;
pub use service::{DispatchService, SendOutcome};
pub use worker::Worker;
