// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end test harness.
//!
//! Builds an isolated pipeline (temp SQLite, broker, capturing adapters,
//! dispatch service) and optionally starts workers and the scheduler.
//! Each harness is independent and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use courier_adapters::AdapterSet;
use courier_broker::{Broker, BrokerSettings};
use courier_core::types::{now_timestamp, Platform, User};
use courier_core::{hash_api_key, CourierError};
use courier_dispatch::{DispatchService, Scheduler, Worker};
use courier_storage::{Database, MessageRepository, RecipientRepository, UserRepository};

use crate::sender::CapturingSender;

/// The API key the harness user authenticates with.
pub const TEST_API_KEY: &str = "test-api-key";

/// A fully wired pipeline over a temp database.
pub struct TestHarness {
    pub db: Database,
    pub broker: Broker,
    pub service: DispatchService,
    pub users: UserRepository,
    pub messages: MessageRepository,
    pub recipients: RecipientRepository,
    pub adapters: AdapterSet,
    pub sms: Arc<CapturingSender>,
    pub email: Arc<CapturingSender>,
    pub whatsapp: Arc<CapturingSender>,
    pub telegram: Arc<CapturingSender>,
    pub user: User,
    pub cancel: CancellationToken,
    _dir: TempDir,
}

impl TestHarness {
    /// Build the pipeline and seed one active user on the `free` tier.
    pub async fn new() -> Result<Self, CourierError> {
        let dir = tempfile::tempdir().map_err(|e| CourierError::Internal(e.to_string()))?;
        let db_path = dir.path().join("harness.db");
        let db = Database::open(db_path.to_str().expect("utf-8 temp path")).await?;

        let broker = Broker::new(
            db.clone(),
            BrokerSettings {
                poll_interval: Duration::from_millis(20),
                ..BrokerSettings::default()
            },
        );
        for platform in Platform::ALL {
            broker.declare_queue(platform.routing_key(), platform.routing_key());
        }

        let sms = Arc::new(CapturingSender::new(Platform::Sms));
        let email = Arc::new(CapturingSender::new(Platform::Email));
        let whatsapp = Arc::new(CapturingSender::new(Platform::Whatsapp));
        let telegram = Arc::new(CapturingSender::new(Platform::Telegram));
        let adapters = AdapterSet::new(
            sms.clone(),
            email.clone(),
            whatsapp.clone(),
            telegram.clone(),
        );

        let users = UserRepository::new(db.clone());
        let now = now_timestamp();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: "harness@example.com".to_string(),
            api_key_hash: hash_api_key(TEST_API_KEY),
            role: "user".to_string(),
            rate_limit_tier: "free".to_string(),
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        };
        users.insert(&user).await?;

        Ok(Self {
            service: DispatchService::new(db.clone(), broker.clone()),
            messages: MessageRepository::new(db.clone()),
            recipients: RecipientRepository::new(db.clone()),
            users,
            broker,
            adapters,
            sms,
            email,
            whatsapp,
            telegram,
            user,
            cancel: CancellationToken::new(),
            db,
            _dir: dir,
        })
    }

    /// Start one worker per channel.
    pub fn start_workers(&self, prefetch: usize) {
        let worker = Arc::new(Worker::new(self.recipients.clone(), self.adapters.clone()));
        for platform in Platform::ALL {
            tokio::spawn(worker.clone().run(
                self.broker.clone(),
                platform,
                prefetch,
                self.cancel.clone(),
            ));
        }
    }

    /// Start the scheduler with a short interval.
    pub fn start_scheduler(&self, interval: Duration) {
        let scheduler = Scheduler::new(
            self.messages.clone(),
            Arc::new(self.service.clone()),
            interval,
            50,
        );
        tokio::spawn(scheduler.run(self.cancel.clone()));
    }

    /// Stop workers and scheduler.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Poll until `condition` holds or a 5 s deadline expires.
    pub async fn wait_until<F, Fut>(&self, mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if condition().await {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached within 5s");
    }
}
