// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The sealed adapter set: one sender per channel, fixed at boot.
//!
//! Lookup is total: every platform that passes request validation has an
//! adapter, so a worker can never encounter an unroutable event.

use std::sync::Arc;

use courier_core::{Platform, Sender};

use crate::mock::MockSender;

/// One adapter per delivery channel.
#[derive(Clone)]
pub struct AdapterSet {
    sms: Arc<dyn Sender>,
    email: Arc<dyn Sender>,
    whatsapp: Arc<dyn Sender>,
    telegram: Arc<dyn Sender>,
}

impl AdapterSet {
    pub fn new(
        sms: Arc<dyn Sender>,
        email: Arc<dyn Sender>,
        whatsapp: Arc<dyn Sender>,
        telegram: Arc<dyn Sender>,
    ) -> Self {
        Self {
            sms,
            email,
            whatsapp,
            telegram,
        }
    }

    /// All channels on the mock adapter. Used for local development and tests.
    pub fn all_mock() -> Self {
        Self::new(
            Arc::new(MockSender::new(Platform::Sms)),
            Arc::new(MockSender::new(Platform::Email)),
            Arc::new(MockSender::new(Platform::Whatsapp)),
            Arc::new(MockSender::new(Platform::Telegram)),
        )
    }

    pub fn get(&self, platform: Platform) -> Arc<dyn Sender> {
        match platform {
            Platform::Sms => self.sms.clone(),
            Platform::Email => self.email.clone(),
            Platform::Whatsapp => self.whatsapp.clone(),
            Platform::Telegram => self.telegram.clone(),
        }
    }
}
