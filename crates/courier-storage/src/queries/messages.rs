// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message row operations: transactional inserts, conditional status
//! claims, filtered listing, and the scheduler's due-message scan.

use courier_core::types::{now_timestamp, Message, MessageStatus, Platform};
use courier_core::CourierError;
use rusqlite::{params, types::Value, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::queries::{platform_from_str, priority_from_code, status_from_code};

const MESSAGE_COLUMNS: &str =
    "id, user_id, subject, body, sender, platform, priority, status, scheduled_at, created_at, updated_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let platform: String = row.get(5)?;
    let priority: i64 = row.get(6)?;
    let status: i64 = row.get(7)?;
    Ok(Message {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        sender: row.get(4)?,
        platform: platform_from_str(5, &platform)?,
        priority: priority_from_code(6, priority)?,
        status: status_from_code(7, status)?,
        scheduled_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert a message row inside the caller's transaction.
pub fn insert_tx(conn: &rusqlite::Connection, msg: &Message) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, user_id, subject, body, sender, platform, priority, status, scheduled_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            msg.id,
            msg.user_id,
            msg.subject,
            msg.body,
            msg.sender,
            msg.platform.to_string(),
            msg.priority.code(),
            msg.status.code(),
            msg.scheduled_at,
            msg.created_at,
            msg.updated_at,
        ],
    )?;
    Ok(())
}

/// Conditionally transition a message `from` one status `to` another inside
/// the caller's transaction. Returns whether a row was claimed.
///
/// This is the claim primitive: only one of two racing callers observes
/// `true`, so a scheduled message is released at most once.
pub fn claim_tx(
    conn: &rusqlite::Connection,
    id: &str,
    from: MessageStatus,
    to: MessageStatus,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.code(), now, id, from.code()],
    )?;
    Ok(changed > 0)
}

/// Fetch a message by id.
pub async fn get_by_id(db: &Database, id: &str) -> Result<Message, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let msg = conn
                .query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                    params![id],
                    row_to_message,
                )
                .optional()?;
            Ok(msg)
        })
        .await
        .map_err(map_tr_err)?
        .ok_or(CourierError::NotFound)
}

enum CancelOutcome {
    Done,
    NotFound,
    NotScheduled(MessageStatus),
}

/// Cancel a scheduled message.
///
/// Fails with [`CourierError::InvalidState`] unless the message currently
/// holds `scheduled` status; the check and the write share one transaction.
pub async fn cancel_scheduled(db: &Database, id: &str) -> Result<(), CourierError> {
    let id = id.to_string();
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<i64> = tx
                .query_row(
                    "SELECT status FROM messages WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = match current {
                None => CancelOutcome::NotFound,
                Some(code) => {
                    let status = status_from_code(0, code)?;
                    if status == MessageStatus::Scheduled {
                        tx.execute(
                            "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3",
                            params![MessageStatus::Cancelled.code(), now_timestamp(), id],
                        )?;
                        CancelOutcome::Done
                    } else {
                        CancelOutcome::NotScheduled(status)
                    }
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        CancelOutcome::Done => Ok(()),
        CancelOutcome::NotFound => Err(CourierError::NotFound),
        CancelOutcome::NotScheduled(status) => Err(CourierError::InvalidState(format!(
            "message is {status}, only scheduled messages can be cancelled"
        ))),
    }
}

/// Optional filters for [`list`].
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub platform: Option<Platform>,
    pub status: Option<MessageStatus>,
    /// Inclusive lower bound on `created_at`, canonical timestamp format.
    pub from: Option<String>,
    /// Inclusive upper bound on `created_at`, canonical timestamp format.
    pub to: Option<String>,
}

/// List a user's messages, newest first, with the total matching count.
pub async fn list(
    db: &Database,
    user_id: &str,
    filter: MessageFilter,
    page: i64,
    limit: i64,
) -> Result<(Vec<Message>, i64), CourierError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut conditions = vec!["user_id = ?1".to_string()];
            let mut args: Vec<Value> = vec![Value::Text(user_id)];

            if let Some(platform) = filter.platform {
                args.push(Value::Text(platform.to_string()));
                conditions.push(format!("platform = ?{}", args.len()));
            }
            if let Some(status) = filter.status {
                args.push(Value::Integer(status.code()));
                conditions.push(format!("status = ?{}", args.len()));
            }
            if let Some(from) = filter.from {
                args.push(Value::Text(from));
                conditions.push(format!("created_at >= ?{}", args.len()));
            }
            if let Some(to) = filter.to {
                args.push(Value::Text(to));
                conditions.push(format!("created_at <= ?{}", args.len()));
            }

            let where_clause = conditions.join(" AND ");

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM messages WHERE {where_clause}"),
                rusqlite::params_from_iter(args.iter()),
                |row| row.get(0),
            )?;

            args.push(Value::Integer(limit));
            let limit_idx = args.len();
            args.push(Value::Integer((page - 1) * limit));
            let offset_idx = args.len();

            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {where_clause}
                 ORDER BY created_at DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
            ))?;
            let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_message)?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok((messages, total))
        })
        .await
        .map_err(map_tr_err)
}

/// Scheduled messages due at or before `before`, oldest first.
pub async fn scheduled_due(
    db: &Database,
    before: &str,
    limit: i64,
) -> Result<Vec<Message>, CourierError> {
    let before = before.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE status = ?1 AND scheduled_at IS NOT NULL AND scheduled_at <= ?2
                 ORDER BY scheduled_at ASC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![MessageStatus::Scheduled.code(), before, limit],
                row_to_message,
            )?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}
