// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue consumer loop with manual acknowledgement and prefetch.
//!
//! Up to `prefetch` deliveries are in flight concurrently; each is handled
//! in its own task and acked on success or nacked (no requeue) on error.
//! Cancellation stops claiming new entries; anything claimed but unacked at
//! shutdown is redelivered after its lock expires.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_core::CourierError;

use crate::broker::Broker;
use crate::store::Delivery;

/// Processes one claimed delivery. Returning an error nacks the entry.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<(), CourierError>;
}

/// Consume `queue_name` until `cancel` fires.
pub async fn consume(
    broker: Broker,
    queue_name: String,
    prefetch: usize,
    handler: Arc<dyn DeliveryHandler>,
    cancel: CancellationToken,
) {
    info!(queue = queue_name.as_str(), prefetch, "consumer started");
    let semaphore = Arc::new(Semaphore::new(prefetch.max(1)));

    loop {
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
            _ = cancel.cancelled() => break,
        };

        match broker.dequeue(&queue_name).await {
            Ok(Some(delivery)) => {
                let broker = broker.clone();
                let handler = handler.clone();
                let queue = queue_name.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    match handler.handle(&delivery).await {
                        Ok(()) => {
                            if let Err(e) = broker.ack(delivery.entry_id).await {
                                error!(queue = queue.as_str(), entry_id = delivery.entry_id,
                                       error = %e, "failed to ack delivery");
                            }
                        }
                        Err(e) => {
                            warn!(queue = queue.as_str(), entry_id = delivery.entry_id,
                                  error = %e, "delivery failed, nacking without requeue");
                            if let Err(e) = broker.nack(delivery.entry_id).await {
                                error!(queue = queue.as_str(), entry_id = delivery.entry_id,
                                       error = %e, "failed to nack delivery");
                            }
                        }
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tokio::select! {
                    _ = broker.wait_for_message(&queue_name) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            Err(e) => {
                drop(permit);
                error!(queue = queue_name.as_str(), error = %e, "dequeue failed");
                tokio::select! {
                    _ = tokio::time::sleep(broker.settings().poll_interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }
    }

    debug!(queue = queue_name.as_str(), "consumer stopped");
}
