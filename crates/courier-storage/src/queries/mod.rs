// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query operations over the Courier schema.
//!
//! Functions suffixed `_tx` are synchronous and take a raw connection so
//! callers can compose them into a single transaction; the async functions
//! are standalone operations serialized through the write thread.

pub mod messages;
pub mod recipients;
pub mod users;

use courier_core::types::{MessageStatus, Platform, Priority};

/// Result of a rank-guarded status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The transition was applied.
    Applied,
    /// The row already holds an equal or later status; nothing was written.
    Skipped,
}

pub(crate) fn status_from_code(idx: usize, code: i64) -> rusqlite::Result<MessageStatus> {
    MessageStatus::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("unknown status code {code}").into(),
        )
    })
}

pub(crate) fn platform_from_str(idx: usize, value: &str) -> rusqlite::Result<Platform> {
    value.parse::<Platform>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown platform {value:?}").into(),
        )
    })
}

pub(crate) fn priority_from_code(idx: usize, code: i64) -> rusqlite::Result<Priority> {
    Priority::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("unknown priority code {code}").into(),
        )
    })
}
