// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-level operations on the `broker_messages` queue table.
//!
//! Entries move `pending -> processing -> completed | failed`. A claimed
//! entry carries a lock deadline; entries whose lock expired are claimed
//! again (redelivery) until their attempt budget runs out, after which they
//! are parked as failed.

use rusqlite::{params, OptionalExtension};

use courier_core::types::now_timestamp;

/// A claimed queue entry handed to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Queue entry id, used for ack/nack.
    pub entry_id: i64,
    /// JSON-encoded dispatch event.
    pub payload: String,
    /// Delivery attempt number, starting at 1.
    pub attempts: i64,
}

/// Stage an entry into a queue inside the caller's transaction.
pub fn stage_tx(
    conn: &rusqlite::Connection,
    queue_name: &str,
    payload: &str,
    max_attempts: i64,
) -> rusqlite::Result<()> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO broker_messages (queue_name, payload, status, max_attempts, created_at, updated_at)
         VALUES (?1, ?2, 'pending', ?3, ?4, ?4)",
        params![queue_name, payload, max_attempts, now],
    )?;
    Ok(())
}

/// Claim the next deliverable entry from the named queue.
///
/// Atomically selects the oldest pending entry (or a processing entry whose
/// lock deadline passed), marks it processing with a fresh lock, and
/// increments its attempt counter. Entries that exhausted their attempt
/// budget are parked as failed and skipped. Returns `None` when the queue
/// has nothing deliverable.
pub fn dequeue_tx(
    conn: &mut rusqlite::Connection,
    queue_name: &str,
    lock_until: &str,
) -> rusqlite::Result<Option<Delivery>> {
    let tx = conn.transaction()?;
    let delivery = loop {
        let now = now_timestamp();
        let candidate: Option<(i64, String, i64, i64)> = tx
            .query_row(
                "SELECT id, payload, attempts, max_attempts FROM broker_messages
                 WHERE queue_name = ?1
                   AND (status = 'pending'
                        OR (status = 'processing' AND locked_until IS NOT NULL AND locked_until < ?2))
                 ORDER BY id ASC
                 LIMIT 1",
                params![queue_name, now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        match candidate {
            None => break None,
            Some((id, payload, attempts, max_attempts)) => {
                if attempts >= max_attempts {
                    tx.execute(
                        "UPDATE broker_messages
                         SET status = 'failed', locked_until = NULL, updated_at = ?1
                         WHERE id = ?2",
                        params![now, id],
                    )?;
                    continue;
                }
                tx.execute(
                    "UPDATE broker_messages
                     SET status = 'processing', attempts = attempts + 1,
                         locked_until = ?1, updated_at = ?2
                     WHERE id = ?3",
                    params![lock_until, now, id],
                )?;
                break Some(Delivery {
                    entry_id: id,
                    payload,
                    attempts: attempts + 1,
                });
            }
        }
    };
    tx.commit()?;
    Ok(delivery)
}

/// Acknowledge successful processing: the entry is marked completed.
pub fn ack_tx(conn: &rusqlite::Connection, entry_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE broker_messages
         SET status = 'completed', locked_until = NULL, updated_at = ?1
         WHERE id = ?2",
        params![now_timestamp(), entry_id],
    )?;
    Ok(())
}

/// Negative acknowledgement without requeue: the entry is parked as failed.
pub fn nack_tx(conn: &rusqlite::Connection, entry_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE broker_messages
         SET status = 'failed', locked_until = NULL, updated_at = ?1
         WHERE id = ?2",
        params![now_timestamp(), entry_id],
    )?;
    Ok(())
}

/// Number of entries in the queue holding the given status.
pub fn count_tx(
    conn: &rusqlite::Connection,
    queue_name: &str,
    status: &str,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM broker_messages WHERE queue_name = ?1 AND status = ?2",
        params![queue_name, status],
        |row| row.get(0),
    )
}
