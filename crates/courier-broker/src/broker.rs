// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The broker facade: a topic exchange over durable per-channel queues.
//!
//! Queue entries live in the `broker_messages` table of the service
//! database, so callers can stage publishes inside their own domain
//! transaction; a staged event becomes visible to consumers exactly when
//! the surrounding transaction commits. In-process wakeups keep consumer
//! latency low; a fallback poll covers entries staged by another process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::warn;

use courier_core::types::format_timestamp;
use courier_core::{CourierError, EXCHANGE_NAME};
use courier_storage::database::{map_tr_err, Database};

use crate::event::DispatchEvent;
use crate::store::{self, Delivery};

/// Broker tuning knobs, taken from `BrokerConfig`.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// How long a claimed entry stays locked before redelivery.
    pub lock_timeout: Duration,
    /// Delivery attempts before an entry is parked as failed.
    pub max_attempts: i64,
    /// Fallback poll interval for consumers when no wakeup arrives.
    pub poll_interval: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(300),
            max_attempts: 3,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// A publish resolved against the exchange bindings, ready to be staged
/// into a transaction.
#[derive(Debug, Clone)]
pub struct StagedPublish {
    pub queue_name: String,
    pub payload: String,
    pub max_attempts: i64,
}

impl StagedPublish {
    /// Insert this publish into its queue inside the caller's transaction.
    pub fn stage(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
        store::stage_tx(conn, &self.queue_name, &self.payload, self.max_attempts)
    }
}

/// Topic exchange plus durable queue access.
#[derive(Clone)]
pub struct Broker {
    db: Database,
    settings: BrokerSettings,
    /// routing key -> bound queue names.
    bindings: Arc<RwLock<HashMap<String, Vec<String>>>>,
    /// queue name -> consumer wakeup.
    notifiers: Arc<DashMap<String, Arc<Notify>>>,
}

impl Broker {
    pub fn new(db: Database, settings: BrokerSettings) -> Self {
        Self {
            db,
            settings,
            bindings: Arc::new(RwLock::new(HashMap::new())),
            notifiers: Arc::new(DashMap::new()),
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Declare a durable queue bound to the exchange by `routing_key`.
    /// Idempotent; called once per channel at boot.
    pub fn declare_queue(&self, queue_name: &str, routing_key: &str) {
        let mut bindings = self.bindings.write().expect("bindings lock poisoned");
        let queues = bindings.entry(routing_key.to_string()).or_default();
        if !queues.iter().any(|q| q == queue_name) {
            queues.push(queue_name.to_string());
        }
        drop(bindings);
        self.notifier(queue_name);
        tracing::debug!(
            exchange = EXCHANGE_NAME,
            queue = queue_name,
            routing_key,
            "queue declared"
        );
    }

    /// Resolve a routing key against the bindings and serialize the event,
    /// producing one [`StagedPublish`] per bound queue.
    ///
    /// An unbound routing key drops the publish, as a topic exchange would;
    /// it is logged because in this service it means a misconfigured boot.
    pub fn prepare_publish(
        &self,
        routing_key: &str,
        event: &DispatchEvent,
    ) -> Result<Vec<StagedPublish>, CourierError> {
        let payload = serde_json::to_string(event).map_err(|e| CourierError::Broker {
            message: format!("failed to encode dispatch event: {e}"),
            source: Some(Box::new(e)),
        })?;

        let bindings = self.bindings.read().expect("bindings lock poisoned");
        let queues = bindings.get(routing_key).cloned().unwrap_or_default();
        if queues.is_empty() {
            warn!(routing_key, "publish dropped: no queue bound to routing key");
        }

        Ok(queues
            .into_iter()
            .map(|queue_name| StagedPublish {
                queue_name,
                payload: payload.clone(),
                max_attempts: self.settings.max_attempts,
            })
            .collect())
    }

    /// Wake the consumers of every queue touched by `staged`. Call after the
    /// staging transaction committed.
    pub fn wake_staged(&self, staged: &[StagedPublish]) {
        for publish in staged {
            self.notifier(&publish.queue_name).notify_one();
        }
    }

    /// Claim the next deliverable entry from `queue_name`.
    pub async fn dequeue(&self, queue_name: &str) -> Result<Option<Delivery>, CourierError> {
        let queue_name = queue_name.to_string();
        let lock_timeout = chrono::Duration::from_std(self.settings.lock_timeout)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let lock_until = format_timestamp(&(Utc::now() + lock_timeout));
        self.db
            .connection()
            .call(move |conn| {
                let delivery = store::dequeue_tx(conn, &queue_name, &lock_until)?;
                Ok(delivery)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Acknowledge successful processing of a claimed entry.
    pub async fn ack(&self, entry_id: i64) -> Result<(), CourierError> {
        self.db
            .connection()
            .call(move |conn| {
                store::ack_tx(conn, entry_id)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Negative-acknowledge without requeue: the entry is parked as failed
    /// and never redelivered.
    pub async fn nack(&self, entry_id: i64) -> Result<(), CourierError> {
        self.db
            .connection()
            .call(move |conn| {
                store::nack_tx(conn, entry_id)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Entries currently holding `status` in `queue_name`. Used by tests and
    /// operational checks.
    pub async fn count(&self, queue_name: &str, status: &str) -> Result<i64, CourierError> {
        let queue_name = queue_name.to_string();
        let status = status.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let n = store::count_tx(conn, &queue_name, &status)?;
                Ok(n)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Wait until a wakeup arrives for `queue_name` or the fallback poll
    /// interval elapses, whichever comes first.
    pub async fn wait_for_message(&self, queue_name: &str) {
        let notify = self.notifier(queue_name);
        tokio::select! {
            _ = notify.notified() => {}
            _ = tokio::time::sleep(self.settings.poll_interval) => {}
        }
    }

    fn notifier(&self, queue_name: &str) -> Arc<Notify> {
        self.notifiers
            .entry(queue_name.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::{now_timestamp, Platform};
    use tempfile::tempdir;

    async fn setup_broker(settings: BrokerSettings) -> (Broker, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("broker.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let broker = Broker::new(db.clone(), settings);
        broker.declare_queue("notification.sms", Platform::Sms.routing_key());
        (broker, db, dir)
    }

    fn make_event(recipient_id: &str) -> DispatchEvent {
        DispatchEvent {
            message_id: "m-1".into(),
            recipient_id: recipient_id.into(),
            to: "+15550001111".into(),
            body: "B".into(),
            subject: Some("S".into()),
            platform: Platform::Sms,
            metadata: None,
            timestamp: now_timestamp(),
        }
    }

    async fn publish(broker: &Broker, db: &Database, event: &DispatchEvent) {
        let staged = broker
            .prepare_publish(event.platform.routing_key(), event)
            .unwrap();
        let to_stage = staged.clone();
        db.connection()
            .call(move |conn| {
                for publish in &to_stage {
                    publish.stage(conn)?;
                }
                Ok(())
            })
            .await
            .unwrap();
        broker.wake_staged(&staged);
    }

    #[tokio::test]
    async fn publish_and_consume_lifecycle() {
        let (broker, db, _dir) = setup_broker(BrokerSettings::default()).await;
        publish(&broker, &db, &make_event("r-1")).await;

        let delivery = broker.dequeue("notification.sms").await.unwrap().unwrap();
        assert_eq!(delivery.attempts, 1);
        let event: DispatchEvent = serde_json::from_str(&delivery.payload).unwrap();
        assert_eq!(event.recipient_id, "r-1");

        // Claimed entries are not redelivered while locked.
        assert!(broker.dequeue("notification.sms").await.unwrap().is_none());

        broker.ack(delivery.entry_id).await.unwrap();
        assert_eq!(broker.count("notification.sms", "completed").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn entries_are_delivered_in_fifo_order() {
        let (broker, db, _dir) = setup_broker(BrokerSettings::default()).await;
        for i in 0..3 {
            publish(&broker, &db, &make_event(&format!("r-{i}"))).await;
        }

        for i in 0..3 {
            let delivery = broker.dequeue("notification.sms").await.unwrap().unwrap();
            let event: DispatchEvent = serde_json::from_str(&delivery.payload).unwrap();
            assert_eq!(event.recipient_id, format!("r-{i}"));
            broker.ack(delivery.entry_id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn nack_parks_entry_without_redelivery() {
        let (broker, db, _dir) = setup_broker(BrokerSettings::default()).await;
        publish(&broker, &db, &make_event("r-1")).await;

        let delivery = broker.dequeue("notification.sms").await.unwrap().unwrap();
        broker.nack(delivery.entry_id).await.unwrap();

        assert!(broker.dequeue("notification.sms").await.unwrap().is_none());
        assert_eq!(broker.count("notification.sms", "failed").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expired_lock_is_redelivered_until_attempts_exhausted() {
        let settings = BrokerSettings {
            lock_timeout: Duration::from_millis(0),
            max_attempts: 2,
            poll_interval: Duration::from_millis(10),
        };
        let (broker, db, _dir) = setup_broker(settings).await;
        publish(&broker, &db, &make_event("r-1")).await;

        // Claim and abandon twice; the zero lock timeout expires immediately.
        let first = broker.dequeue("notification.sms").await.unwrap().unwrap();
        assert_eq!(first.attempts, 1);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = broker.dequeue("notification.sms").await.unwrap().unwrap();
        assert_eq!(second.entry_id, first.entry_id);
        assert_eq!(second.attempts, 2);
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Attempt budget exhausted: parked as failed instead of redelivered.
        assert!(broker.dequeue("notification.sms").await.unwrap().is_none());
        assert_eq!(broker.count("notification.sms", "failed").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unbound_routing_key_drops_publish() {
        let (broker, _db, _dir) = setup_broker(BrokerSettings::default()).await;
        let staged = broker
            .prepare_publish("notification.pigeon", &make_event("r-1"))
            .unwrap();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn wait_for_message_returns_on_wakeup() {
        let (broker, db, _dir) = setup_broker(BrokerSettings {
            poll_interval: Duration::from_secs(30),
            ..BrokerSettings::default()
        })
        .await;

        let waiter = broker.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_for_message("notification.sms").await;
        });

        publish(&broker, &db, &make_event("r-1")).await;

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("wakeup should arrive well before the poll interval")
            .unwrap();
    }
}
