// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel worker: consumes dispatch events, invokes the channel's
//! adapter, and transitions recipient state.
//!
//! Success acks the event after the `sent` transition (with the provider id
//! recorded). Any failure marks the recipient failed and nacks without
//! requeue; delivery errors are terminal in the current design.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use courier_adapters::AdapterSet;
use courier_broker::{consume, Broker, Delivery, DeliveryHandler, DispatchEvent};
use courier_core::types::{MessageStatus, Platform};
use courier_core::CourierError;
use courier_metrics::record_message_processed;
use courier_storage::RecipientRepository;

/// Handles deliveries for every channel; one consumer loop per queue feeds it.
pub struct Worker {
    recipients: RecipientRepository,
    adapters: AdapterSet,
}

impl Worker {
    pub fn new(recipients: RecipientRepository, adapters: AdapterSet) -> Self {
        Self {
            recipients,
            adapters,
        }
    }

    /// Consume `platform`'s queue until `cancel` fires.
    pub async fn run(
        self: Arc<Self>,
        broker: Broker,
        platform: Platform,
        prefetch: usize,
        cancel: CancellationToken,
    ) {
        info!(platform = %platform, "worker started");
        consume(
            broker,
            platform.routing_key().to_string(),
            prefetch,
            self,
            cancel,
        )
        .await;
    }
}

#[async_trait]
impl DeliveryHandler for Worker {
    async fn handle(&self, delivery: &Delivery) -> Result<(), CourierError> {
        let event: DispatchEvent =
            serde_json::from_str(&delivery.payload).map_err(|e| {
                error!(entry_id = delivery.entry_id, error = %e, "undecodable dispatch event");
                CourierError::Broker {
                    message: format!("failed to decode dispatch event: {e}"),
                    source: Some(Box::new(e)),
                }
            })?;

        info!(
            message_id = event.message_id.as_str(),
            recipient_id = event.recipient_id.as_str(),
            platform = %event.platform,
            to = event.to.as_str(),
            "processing notification"
        );

        // Claim the recipient. A failure here is logged and processing
        // continues; the send itself decides the terminal state.
        if let Err(e) = self
            .recipients
            .update_status(&event.recipient_id, MessageStatus::Processing, None, None)
            .await
        {
            warn!(
                recipient_id = event.recipient_id.as_str(),
                error = %e,
                "failed to mark recipient processing"
            );
        }

        let adapter = self.adapters.get(event.platform);
        let subject = event.subject.as_deref().unwrap_or_default();

        match adapter.send(&event.to, subject, &event.body).await {
            Err(e) => {
                warn!(
                    message_id = event.message_id.as_str(),
                    recipient_id = event.recipient_id.as_str(),
                    to = event.to.as_str(),
                    error = %e,
                    "failed to send notification"
                );
                if let Err(update_err) = self
                    .recipients
                    .update_status(
                        &event.recipient_id,
                        MessageStatus::Failed,
                        None,
                        Some(e.to_string()),
                    )
                    .await
                {
                    error!(
                        recipient_id = event.recipient_id.as_str(),
                        error = %update_err,
                        "failed to mark recipient failed"
                    );
                }
                record_message_processed(event.platform, "failure");
                Err(e)
            }
            Ok(receipt) => {
                self.recipients
                    .update_status(
                        &event.recipient_id,
                        MessageStatus::Sent,
                        Some(receipt.provider_id.clone()),
                        None,
                    )
                    .await?;

                record_message_processed(event.platform, "success");
                info!(
                    message_id = event.message_id.as_str(),
                    recipient_id = event.recipient_id.as_str(),
                    provider_id = receipt.provider_id.as_str(),
                    "notification sent"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_broker::BrokerSettings;
    use courier_core::types::{now_timestamp, SendMessageRequest};
    use courier_storage::{Database, StatusUpdate};
    use courier_test_utils::CapturingSender;
    use tempfile::tempdir;

    use crate::service::DispatchService;

    struct Fixture {
        service: DispatchService,
        broker: Broker,
        worker: Worker,
        recipients: RecipientRepository,
        sms: Arc<CapturingSender>,
        _db: Database,
        _dir: tempfile::TempDir,
    }

    async fn setup() -> Fixture {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("worker.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        courier_storage::queries::users::insert(
            &db,
            &courier_core::User {
                id: "u-1".to_string(),
                email: "u-1@example.com".to_string(),
                api_key_hash: "hash-1".to_string(),
                role: "user".to_string(),
                rate_limit_tier: "free".to_string(),
                is_active: true,
                created_at: now_timestamp(),
                updated_at: now_timestamp(),
            },
        )
        .await
        .unwrap();

        let broker = Broker::new(db.clone(), BrokerSettings::default());
        for platform in Platform::ALL {
            broker.declare_queue(platform.routing_key(), platform.routing_key());
        }

        let sms = Arc::new(CapturingSender::new(Platform::Sms));
        let adapters = AdapterSet::new(
            sms.clone(),
            Arc::new(CapturingSender::new(Platform::Email)),
            Arc::new(CapturingSender::new(Platform::Whatsapp)),
            Arc::new(CapturingSender::new(Platform::Telegram)),
        );

        let recipients = RecipientRepository::new(db.clone());
        Fixture {
            service: DispatchService::new(db.clone(), broker.clone()),
            broker,
            worker: Worker::new(recipients.clone(), adapters),
            recipients,
            sms,
            _db: db,
            _dir: dir,
        }
    }

    fn make_request(to: Vec<&str>) -> SendMessageRequest {
        SendMessageRequest {
            subject: "S".into(),
            message: "B".into(),
            from: "X".into(),
            to: to.into_iter().map(String::from).collect(),
            platform: Platform::Sms,
            priority: None,
            scheduled_at: None,
        }
    }

    #[tokio::test]
    async fn successful_delivery_transitions_to_sent() {
        let f = setup().await;
        let outcome = f
            .service
            .send_message("u-1", &make_request(vec!["+15550001111"]))
            .await
            .unwrap();

        let delivery = f.broker.dequeue("notification.sms").await.unwrap().unwrap();
        f.worker.handle(&delivery).await.unwrap();

        let rows = f
            .recipients
            .get_by_message_id(&outcome.message_id)
            .await
            .unwrap();
        assert_eq!(rows[0].status, MessageStatus::Sent);
        assert_eq!(rows[0].provider_id.as_deref(), Some("test-sms-0"));
        assert!(rows[0].sent_at.is_some());

        let sent = f.sms.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "+15550001111");
        assert_eq!(sent[0].subject, "S");
        assert_eq!(sent[0].body, "B");
    }

    #[tokio::test]
    async fn adapter_error_marks_recipient_failed() {
        let f = setup().await;
        f.sms.fail_with("carrier rejected").await;

        let outcome = f
            .service
            .send_message("u-1", &make_request(vec!["+15550001111"]))
            .await
            .unwrap();

        let delivery = f.broker.dequeue("notification.sms").await.unwrap().unwrap();
        let err = f.worker.handle(&delivery).await.unwrap_err();
        assert!(err.to_string().contains("carrier rejected"));

        let rows = f
            .recipients
            .get_by_message_id(&outcome.message_id)
            .await
            .unwrap();
        assert_eq!(rows[0].status, MessageStatus::Failed);
        assert!(rows[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("carrier rejected"));
        assert!(rows[0].provider_id.is_none());
    }

    #[tokio::test]
    async fn undecodable_payload_is_rejected() {
        let f = setup().await;
        let delivery = Delivery {
            entry_id: 1,
            payload: "not json".to_string(),
            attempts: 1,
        };
        let err = f.worker.handle(&delivery).await.unwrap_err();
        assert!(matches!(err, CourierError::Broker { .. }));
    }

    #[tokio::test]
    async fn redelivered_event_does_not_regress_a_sent_recipient() {
        let f = setup().await;
        let outcome = f
            .service
            .send_message("u-1", &make_request(vec!["+15550001111"]))
            .await
            .unwrap();

        let delivery = f.broker.dequeue("notification.sms").await.unwrap().unwrap();
        f.worker.handle(&delivery).await.unwrap();

        // Webhook confirms delivery before a redelivered event arrives.
        let rows = f
            .recipients
            .get_by_message_id(&outcome.message_id)
            .await
            .unwrap();
        f.recipients
            .update_status(&rows[0].id, MessageStatus::Delivered, None, None)
            .await
            .unwrap();

        // Handling the same event again re-sends (at-least-once), but the
        // recipient stays delivered.
        f.worker.handle(&delivery).await.unwrap();
        let rows = f
            .recipients
            .get_by_message_id(&outcome.message_id)
            .await
            .unwrap();
        assert_eq!(rows[0].status, MessageStatus::Delivered);
        assert_eq!(rows[0].provider_id.as_deref(), Some("test-sms-0"));
    }

    #[tokio::test]
    async fn worker_runs_through_the_consumer_loop() {
        let f = setup().await;
        let worker = Arc::new(f.worker);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(worker.clone().run(
            f.broker.clone(),
            Platform::Sms,
            4,
            cancel.clone(),
        ));

        let outcome = f
            .service
            .send_message("u-1", &make_request(vec!["+1", "+2"]))
            .await
            .unwrap();

        // Wait for both recipients to reach sent.
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let rows = f
                    .recipients
                    .get_by_message_id(&outcome.message_id)
                    .await
                    .unwrap();
                if rows.iter().all(|r| r.status == MessageStatus::Sent) {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("recipients should reach sent");

        assert_eq!(
            f.broker.count("notification.sms", "completed").await.unwrap(),
            2
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn status_update_skip_is_not_an_error() {
        let f = setup().await;
        let outcome = f
            .service
            .send_message("u-1", &make_request(vec!["+1"]))
            .await
            .unwrap();
        let rows = f
            .recipients
            .get_by_message_id(&outcome.message_id)
            .await
            .unwrap();

        // Drive the recipient to delivered directly, then confirm a
        // duplicate update reports a skip rather than failing.
        f.recipients
            .update_status(&rows[0].id, MessageStatus::Delivered, None, None)
            .await
            .unwrap();
        let outcome = f
            .recipients
            .update_status(&rows[0].id, MessageStatus::Delivered, None, None)
            .await
            .unwrap();
        assert_eq!(outcome, StatusUpdate::Skipped);
    }
}
