// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin typed repositories over the query modules.
//!
//! Each repository clones the shared [`Database`] handle; all writes still
//! funnel through the single serialized writer.

use courier_core::types::{MessageStatus, Recipient, User};
use courier_core::{CourierError, Message};

use crate::database::Database;
use crate::queries::{self, messages::MessageFilter, StatusUpdate};

/// Read-only access to users, plus provisioning for the seed tool.
#[derive(Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, user: &User) -> Result<(), CourierError> {
        queries::users::insert(&self.db, user).await
    }

    pub async fn get_by_api_key_hash(&self, hash: &str) -> Result<User, CourierError> {
        queries::users::get_by_api_key_hash(&self.db, hash).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<User, CourierError> {
        queries::users::get_by_id(&self.db, id).await
    }
}

/// Message reads and the conditional transitions the dispatch pipeline uses.
#[derive(Clone)]
pub struct MessageRepository {
    db: Database,
}

impl MessageRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Message, CourierError> {
        queries::messages::get_by_id(&self.db, id).await
    }

    /// Cancel a message that is still scheduled; 409-style error otherwise.
    pub async fn cancel_scheduled(&self, id: &str) -> Result<(), CourierError> {
        queries::messages::cancel_scheduled(&self.db, id).await
    }

    pub async fn list(
        &self,
        user_id: &str,
        filter: MessageFilter,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64), CourierError> {
        queries::messages::list(&self.db, user_id, filter, page, limit).await
    }

    /// Scheduled messages due at or before `before`, oldest first.
    pub async fn scheduled_due(
        &self,
        before: &str,
        limit: i64,
    ) -> Result<Vec<Message>, CourierError> {
        queries::messages::scheduled_due(&self.db, before, limit).await
    }
}

/// Recipient reads and the rank-guarded status transition.
#[derive(Clone)]
pub struct RecipientRepository {
    db: Database,
}

impl RecipientRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Vec<Recipient>, CourierError> {
        queries::recipients::get_by_message_id(&self.db, message_id).await
    }

    pub async fn get_by_provider_id(&self, provider_id: &str) -> Result<Recipient, CourierError> {
        queries::recipients::get_by_provider_id(&self.db, provider_id).await
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: MessageStatus,
        provider_id: Option<String>,
        error_message: Option<String>,
    ) -> Result<StatusUpdate, CourierError> {
        queries::recipients::update_status(&self.db, id, status, provider_id, error_message).await
    }
}
