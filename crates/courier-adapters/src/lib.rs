// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapters for Courier delivery channels.
//!
//! Each adapter turns an internal send into one external provider call and
//! yields the provider-assigned id used for webhook correlation. The
//! [`AdapterSet`] fixes one adapter per channel at boot.

pub mod mock;
pub mod sendgrid;
pub mod set;
pub mod twilio;

pub use mock::MockSender;
pub use sendgrid::{SendGridConfig, SendGridSender};
pub use set::AdapterSet;
pub use twilio::{TwilioConfig, TwilioSender};
