// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic release of scheduled messages.
//!
//! Every tick scans for messages whose release time passed and hands each
//! to the dispatch service, which claims the row before staging events.
//! Rows that fail to release stay scheduled and are retried next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use courier_core::types::now_timestamp;
use courier_storage::MessageRepository;

use crate::service::DispatchService;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_BATCH_SIZE: i64 = 50;

/// Polls for due scheduled messages and releases them.
pub struct Scheduler {
    messages: MessageRepository,
    service: Arc<DispatchService>,
    interval: Duration,
    batch_size: i64,
}

impl Scheduler {
    pub fn new(
        messages: MessageRepository,
        service: Arc<DispatchService>,
        interval: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            messages,
            service,
            interval: if interval.is_zero() {
                DEFAULT_INTERVAL
            } else {
                interval
            },
            batch_size: if batch_size <= 0 {
                DEFAULT_BATCH_SIZE
            } else {
                batch_size
            },
        }
    }

    /// Run the polling loop until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            batch_size = self.batch_size,
            "scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Skip the first immediate tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.scan().await;
                }
                _ = cancel.cancelled() => {
                    info!("scheduler stopped");
                    break;
                }
            }
        }
    }

    /// One scan: find due messages and release each. Errors on one row are
    /// logged and do not block the rest of the batch.
    pub async fn scan(&self) {
        let due = match self
            .messages
            .scheduled_due(&now_timestamp(), self.batch_size)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "scheduler: failed to query due messages");
                return;
            }
        };

        if due.is_empty() {
            return;
        }

        info!(count = due.len(), "scheduler: found due scheduled messages");

        for msg in &due {
            match self.service.release_scheduled(msg).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        message_id = msg.id.as_str(),
                        "scheduler: message already claimed or cancelled"
                    );
                }
                Err(e) => {
                    error!(
                        message_id = msg.id.as_str(),
                        error = %e,
                        "scheduler: failed to release message"
                    );
                }
            }
        }
    }
}
