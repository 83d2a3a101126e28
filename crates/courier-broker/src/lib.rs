// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable topic-routed dispatch queue for the Courier pipeline.
//!
//! A topic exchange routes per-recipient dispatch events into durable
//! per-channel queues stored in the service database. Publishers stage
//! events inside their own transactions; consumers claim entries with a
//! processing lock, manual ack/nack, and bounded redelivery.

pub mod broker;
pub mod consumer;
pub mod event;
pub mod store;

pub use broker::{Broker, BrokerSettings, StagedPublish};
pub use consumer::{consume, DeliveryHandler};
pub use event::DispatchEvent;
pub use store::Delivery;
