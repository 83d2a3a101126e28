// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient row operations.
//!
//! Status updates are rank-guarded: a transition only applies when the new
//! status ranks strictly above the stored one, which makes duplicate webhook
//! deliveries idempotent and forbids regression (a late `sent` callback
//! cannot undo `delivered`). `sent_at`/`delivered_at` are stamped on the
//! transition into the respective status; `provider_id` is written at most
//! once.

use courier_core::types::{now_timestamp, MessageStatus, Recipient};
use courier_core::CourierError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::queries::{status_from_code, StatusUpdate};

const RECIPIENT_COLUMNS: &str =
    "id, message_id, recipient, status, provider_id, error_message, retry_count, sent_at, delivered_at, created_at, updated_at";

fn row_to_recipient(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recipient> {
    let status: i64 = row.get(3)?;
    Ok(Recipient {
        id: row.get(0)?,
        message_id: row.get(1)?,
        recipient: row.get(2)?,
        status: status_from_code(3, status)?,
        provider_id: row.get(4)?,
        error_message: row.get(5)?,
        retry_count: row.get(6)?,
        sent_at: row.get(7)?,
        delivered_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert all recipient rows of a message inside the caller's transaction.
pub fn batch_insert_tx(
    conn: &rusqlite::Connection,
    recipients: &[Recipient],
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO message_recipients (id, message_id, recipient, status, retry_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for r in recipients {
        stmt.execute(params![
            r.id,
            r.message_id,
            r.recipient,
            r.status.code(),
            r.retry_count,
            r.created_at,
            r.updated_at,
        ])?;
    }
    Ok(())
}

/// Load a message's recipients inside the caller's transaction, in insertion
/// order.
pub fn list_by_message_tx(
    conn: &rusqlite::Connection,
    message_id: &str,
) -> rusqlite::Result<Vec<Recipient>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECIPIENT_COLUMNS} FROM message_recipients WHERE message_id = ?1 ORDER BY created_at, id"
    ))?;
    let rows = stmt.query_map(params![message_id], row_to_recipient)?;

    let mut recipients = Vec::new();
    for row in rows {
        recipients.push(row?);
    }
    Ok(recipients)
}

/// Load a message's recipients.
pub async fn get_by_message_id(
    db: &Database,
    message_id: &str,
) -> Result<Vec<Recipient>, CourierError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let recipients = list_by_message_tx(conn, &message_id)?;
            Ok(recipients)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up the recipient a provider callback refers to.
pub async fn get_by_provider_id(
    db: &Database,
    provider_id: &str,
) -> Result<Recipient, CourierError> {
    let provider_id = provider_id.to_string();
    db.connection()
        .call(move |conn| {
            let recipient = conn
                .query_row(
                    &format!(
                        "SELECT {RECIPIENT_COLUMNS} FROM message_recipients WHERE provider_id = ?1"
                    ),
                    params![provider_id],
                    row_to_recipient,
                )
                .optional()?;
            Ok(recipient)
        })
        .await
        .map_err(map_tr_err)?
        .ok_or(CourierError::NotFound)
}

enum UpdateOutcome {
    Applied,
    Skipped,
    NotFound,
}

/// Rank-guarded status transition.
///
/// `provider_id` is only persisted if the column is still NULL;
/// `error_message` only overwrites when a new value is supplied. The read
/// and the write share one transaction, and all writes go through the single
/// serialized writer, so the guard cannot race.
pub async fn update_status(
    db: &Database,
    id: &str,
    status: MessageStatus,
    provider_id: Option<String>,
    error_message: Option<String>,
) -> Result<StatusUpdate, CourierError> {
    let id = id.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<i64> = tx
                .query_row(
                    "SELECT status FROM message_recipients WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = match current {
                None => UpdateOutcome::NotFound,
                Some(code) => {
                    let current = status_from_code(0, code)?;
                    if status.rank() <= current.rank() {
                        UpdateOutcome::Skipped
                    } else {
                        let now = now_timestamp();
                        match status {
                            MessageStatus::Sent => {
                                tx.execute(
                                    "UPDATE message_recipients
                                     SET status = ?1,
                                         provider_id = COALESCE(provider_id, ?2),
                                         error_message = COALESCE(?3, error_message),
                                         sent_at = ?4,
                                         updated_at = ?4
                                     WHERE id = ?5",
                                    params![status.code(), provider_id, error_message, now, id],
                                )?;
                            }
                            MessageStatus::Delivered => {
                                tx.execute(
                                    "UPDATE message_recipients
                                     SET status = ?1,
                                         provider_id = COALESCE(provider_id, ?2),
                                         error_message = COALESCE(?3, error_message),
                                         delivered_at = ?4,
                                         updated_at = ?4
                                     WHERE id = ?5",
                                    params![status.code(), provider_id, error_message, now, id],
                                )?;
                            }
                            _ => {
                                tx.execute(
                                    "UPDATE message_recipients
                                     SET status = ?1,
                                         provider_id = COALESCE(provider_id, ?2),
                                         error_message = COALESCE(?3, error_message),
                                         updated_at = ?4
                                     WHERE id = ?5",
                                    params![status.code(), provider_id, error_message, now, id],
                                )?;
                            }
                        }
                        UpdateOutcome::Applied
                    }
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        UpdateOutcome::Applied => Ok(StatusUpdate::Applied),
        UpdateOutcome::Skipped => Ok(StatusUpdate::Skipped),
        UpdateOutcome::NotFound => Err(CourierError::NotFound),
    }
}
