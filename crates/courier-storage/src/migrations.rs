// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations for the Courier database.
//!
//! The `.sql` files under this crate's `migrations/` directory are embedded
//! at build time and applied by refinery whenever [`crate::database::Database::open`]
//! runs, so a fresh database file and a reopened one end up with the same
//! schema (users, messages, message_recipients, and the broker queue).

use courier_core::CourierError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply any migrations the database has not seen yet.
///
/// Already-applied versions are skipped based on refinery's own history
/// table, which makes re-running on every open a no-op.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), CourierError> {
    embedded::migrations::runner().run(conn).map_err(|e| {
        CourierError::Storage {
            source: Box::new(e),
        }
    })?;
    Ok(())
}
