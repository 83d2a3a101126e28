// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier dispatch service.

use thiserror::Error;

/// The primary error type used across all Courier crates.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Broker errors (staging, consuming, payload decoding).
    #[error("broker error: {message}")]
    Broker {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Provider adapter errors (HTTP failure, provider rejection).
    #[error("adapter error: {message}")]
    Adapter {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A read matched no row, or a mutation affected no row.
    #[error("record not found")]
    NotFound,

    /// The operation is not valid in the record's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
