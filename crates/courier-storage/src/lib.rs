// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Courier dispatch service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed repositories for users,
//! messages, and per-message recipients. The broker's durable queue shares
//! this database, which is what lets ingest stage dispatch events inside the
//! same transaction as the domain rows.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod repositories;

pub use database::Database;
pub use queries::messages::MessageFilter;
pub use queries::StatusUpdate;
pub use repositories::{MessageRepository, RecipientRepository, UserRepository};
