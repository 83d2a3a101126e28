// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier notification dispatch service.
//!
//! This crate provides the shared domain model (channels, the status
//! machine, persisted row types), the error type, and the traits adapters
//! implement. Every other crate in the workspace builds on these
//! definitions.

pub mod auth;
pub mod error;
pub mod traits;
pub mod types;

pub use auth::hash_api_key;
pub use error::CourierError;
pub use traits::{CounterStore, SendReceipt, Sender};
pub use types::{
    Message, MessageStatus, Platform, Priority, Recipient, SendMessageRequest, User,
    EXCHANGE_NAME,
};
