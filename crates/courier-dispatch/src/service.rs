// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch service: atomic ingest, cancel, and scheduled release.
//!
//! Ingest writes the message row, its recipient fan-out, and the staged
//! broker events in one transaction; the broker queue shares the service
//! database, so there is no window where the domain rows and the queue
//! disagree. Scheduled release claims the row with a conditional update
//! before staging, so a due message is published at most once.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use courier_broker::{Broker, DispatchEvent, StagedPublish};
use courier_core::types::{
    format_timestamp, Message, MessageStatus, Priority, Recipient, SendMessageRequest,
};
use courier_core::CourierError;
use courier_metrics::record_message_published;
use courier_storage::database::{map_tr_err, Database};
use courier_storage::queries::{messages, recipients};

/// Result of a successful ingest.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message_id: String,
    pub recipients_count: usize,
    pub estimated_delivery: String,
    pub request_id: String,
}

/// Owns the write side of the message lifecycle.
#[derive(Clone)]
pub struct DispatchService {
    db: Database,
    broker: Broker,
}

impl DispatchService {
    pub fn new(db: Database, broker: Broker) -> Self {
        Self { db, broker }
    }

    /// Atomically persist a message with its recipient fan-out and, unless
    /// the message is scheduled for later, stage one dispatch event per
    /// recipient on the channel's routing key.
    pub async fn send_message(
        &self,
        user_id: &str,
        req: &SendMessageRequest,
    ) -> Result<SendOutcome, CourierError> {
        let now = Utc::now();
        let now_str = format_timestamp(&now);
        let message_id = Uuid::new_v4().to_string();

        let priority = req
            .priority
            .and_then(|p| Priority::from_code(i64::from(p)))
            .unwrap_or(Priority::Normal);

        // Scheduled messages are saved but not published until the scheduler
        // releases them.
        let is_scheduled = req.scheduled_at.map(|at| at > now).unwrap_or(false);
        let status = if is_scheduled {
            MessageStatus::Scheduled
        } else {
            MessageStatus::Pending
        };

        let msg = Message {
            id: message_id.clone(),
            user_id: user_id.to_string(),
            subject: req.subject.clone(),
            body: req.message.clone(),
            sender: req.from.clone(),
            platform: req.platform,
            priority,
            status,
            scheduled_at: req.scheduled_at.map(|at| format_timestamp(&at)),
            created_at: now_str.clone(),
            updated_at: now_str.clone(),
        };

        let recipient_rows: Vec<Recipient> = req
            .to
            .iter()
            .map(|to| Recipient {
                id: Uuid::new_v4().to_string(),
                message_id: message_id.clone(),
                recipient: to.clone(),
                status: MessageStatus::Pending,
                provider_id: None,
                error_message: None,
                retry_count: 0,
                sent_at: None,
                delivered_at: None,
                created_at: now_str.clone(),
                updated_at: now_str.clone(),
            })
            .collect();

        let staged = if is_scheduled {
            Vec::new()
        } else {
            self.prepare_events(&msg, &recipient_rows, &now_str)?
        };

        let tx_msg = msg.clone();
        let tx_recipients = recipient_rows.clone();
        let tx_staged = staged.clone();
        let tx_now = now_str.clone();
        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                messages::insert_tx(&tx, &tx_msg)?;
                recipients::batch_insert_tx(&tx, &tx_recipients)?;
                for publish in &tx_staged {
                    publish.stage(&tx)?;
                }
                if tx_msg.status == MessageStatus::Pending {
                    // Events are staged; the message is now queued.
                    messages::claim_tx(
                        &tx,
                        &tx_msg.id,
                        MessageStatus::Pending,
                        MessageStatus::Queued,
                        &tx_now,
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.broker.wake_staged(&staged);
        for _ in &staged {
            record_message_published(msg.platform);
        }

        info!(
            message_id = message_id.as_str(),
            recipients = recipient_rows.len(),
            platform = %msg.platform,
            scheduled = is_scheduled,
            "message ingested"
        );

        Ok(SendOutcome {
            message_id,
            recipients_count: recipient_rows.len(),
            estimated_delivery: format_timestamp(&(now + chrono::Duration::seconds(30))),
            request_id: Uuid::new_v4().to_string(),
        })
    }

    /// Cancel a message that is still scheduled.
    pub async fn cancel_message(&self, id: &str) -> Result<(), CourierError> {
        messages::cancel_scheduled(&self.db, id).await?;
        info!(message_id = id, "scheduled message cancelled");
        Ok(())
    }

    /// Release one due scheduled message: claim it with a conditional
    /// update, then stage its recipients' events, all in one transaction.
    ///
    /// Returns `false` when the claim lost: the message was already
    /// released by a racing scan or cancelled in the meantime.
    pub async fn release_scheduled(&self, message: &Message) -> Result<bool, CourierError> {
        let broker = self.broker.clone();
        let msg = message.clone();

        let staged = self
            .db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let now = courier_core::types::now_timestamp();
                let claimed = messages::claim_tx(
                    &tx,
                    &msg.id,
                    MessageStatus::Scheduled,
                    MessageStatus::Queued,
                    &now,
                )?;
                if !claimed {
                    tx.commit()?;
                    return Ok(None);
                }

                let rows = recipients::list_by_message_tx(&tx, &msg.id)?;
                let mut staged = Vec::new();
                for r in &rows {
                    let event = DispatchEvent {
                        message_id: msg.id.clone(),
                        recipient_id: r.id.clone(),
                        to: r.recipient.clone(),
                        body: msg.body.clone(),
                        subject: Some(msg.subject.clone()),
                        platform: msg.platform,
                        metadata: None,
                        timestamp: now.clone(),
                    };
                    let publishes = broker
                        .prepare_publish(msg.platform.routing_key(), &event)
                        .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                    for publish in &publishes {
                        publish.stage(&tx)?;
                    }
                    staged.extend(publishes);
                }
                tx.commit()?;
                Ok(Some(staged))
            })
            .await
            .map_err(map_tr_err)?;

        match staged {
            None => Ok(false),
            Some(staged) => {
                self.broker.wake_staged(&staged);
                for _ in &staged {
                    record_message_published(message.platform);
                }
                info!(
                    message_id = message.id.as_str(),
                    events = staged.len(),
                    "scheduled message released"
                );
                Ok(true)
            }
        }
    }

    fn prepare_events(
        &self,
        msg: &Message,
        recipient_rows: &[Recipient],
        timestamp: &str,
    ) -> Result<Vec<StagedPublish>, CourierError> {
        let mut staged = Vec::new();
        for r in recipient_rows {
            let event = DispatchEvent {
                message_id: msg.id.clone(),
                recipient_id: r.id.clone(),
                to: r.recipient.clone(),
                body: msg.body.clone(),
                subject: Some(msg.subject.clone()),
                platform: msg.platform,
                metadata: None,
                timestamp: timestamp.to_string(),
            };
            staged.extend(
                self.broker
                    .prepare_publish(msg.platform.routing_key(), &event)?,
            );
        }
        Ok(staged)
    }
}
