// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model shared across the Courier workspace: delivery channels,
//! the message/recipient status machine, and the persisted row types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

/// Name of the topic exchange dispatch events are published to.
pub const EXCHANGE_NAME: &str = "notification.exchange";

/// Timestamp format used for every persisted timestamp column.
///
/// Fixed-width UTC so that lexicographic comparison in SQL matches
/// chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current time rendered in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Render an arbitrary instant in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// A notification delivery channel.
///
/// The set is sealed: every channel has a worker queue and an adapter slot,
/// and request validation rejects anything else before ingest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Sms,
    Whatsapp,
    Telegram,
    Email,
}

impl Platform {
    /// All channels, in worker start-up order.
    pub const ALL: [Platform; 4] = [
        Platform::Sms,
        Platform::Email,
        Platform::Whatsapp,
        Platform::Telegram,
    ];

    /// Routing key for this channel on the topic exchange. The per-channel
    /// queue carries the same name and is bound by it.
    pub fn routing_key(&self) -> &'static str {
        match self {
            Platform::Sms => "notification.sms",
            Platform::Email => "notification.email",
            Platform::Whatsapp => "notification.whatsapp",
            Platform::Telegram => "notification.telegram",
        }
    }
}

/// Message urgency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Priority {
    pub fn code(&self) -> i64 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Priority::Low),
            1 => Some(Priority::Normal),
            2 => Some(Priority::High),
            _ => None,
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Priority::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown priority code: {code}")))
    }
}

/// Processing state shared by messages and recipients.
///
/// Wire and storage representation is the numeric code. Transitions are
/// monotone along [`MessageStatus::rank`]: an update only applies when the
/// new status ranks strictly above the current one, which makes duplicate
/// provider callbacks idempotent and forbids regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    Queued,
    Processing,
    Sent,
    Delivered,
    Failed,
    Pending,
    Cancelled,
    Scheduled,
}

impl MessageStatus {
    /// Stable numeric code used in the database and API payloads.
    pub fn code(&self) -> i64 {
        match self {
            MessageStatus::Queued => 0,
            MessageStatus::Processing => 1,
            MessageStatus::Sent => 2,
            MessageStatus::Delivered => 3,
            MessageStatus::Failed => 4,
            MessageStatus::Pending => 5,
            MessageStatus::Cancelled => 6,
            MessageStatus::Scheduled => 7,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MessageStatus::Queued),
            1 => Some(MessageStatus::Processing),
            2 => Some(MessageStatus::Sent),
            3 => Some(MessageStatus::Delivered),
            4 => Some(MessageStatus::Failed),
            5 => Some(MessageStatus::Pending),
            6 => Some(MessageStatus::Cancelled),
            7 => Some(MessageStatus::Scheduled),
            _ => None,
        }
    }

    /// Position along the delivery lifecycle. `delivered` and `failed` share
    /// a rank so neither can overwrite the other.
    pub fn rank(&self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Scheduled => 1,
            MessageStatus::Queued => 2,
            MessageStatus::Processing => 3,
            MessageStatus::Sent => 4,
            MessageStatus::Delivered | MessageStatus::Failed => 5,
            MessageStatus::Cancelled => 6,
        }
    }

    /// Terminal states receive no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Delivered | MessageStatus::Failed | MessageStatus::Cancelled
        )
    }
}

impl Serialize for MessageStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for MessageStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        MessageStatus::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown status code: {code}")))
    }
}

/// A notification message as stored in the database.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub platform: Platform,
    pub priority: Priority,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A single delivery target of a message, created in the same transaction
/// as its parent row.
#[derive(Debug, Clone, Serialize)]
pub struct Recipient {
    pub id: String,
    pub message_id: String,
    pub recipient: String,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A registered API user. Provisioned out-of-band; the service reads it
/// during authentication and rate limiting only.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub role: String,
    pub rate_limit_tier: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Maximum number of recipients accepted in one send request.
pub const MAX_RECIPIENTS: usize = 1000;
/// Maximum subject length in characters.
pub const MAX_SUBJECT_LEN: usize = 200;
/// Maximum body length in characters.
pub const MAX_BODY_LEN: usize = 5000;
/// Maximum sender identifier length in characters.
pub const MAX_SENDER_LEN: usize = 100;

/// API request body for sending a message to one or many recipients.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub subject: String,
    pub message: String,
    pub from: String,
    pub to: Vec<String>,
    pub platform: Platform,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl SendMessageRequest {
    /// Validate field constraints, returning per-field error messages.
    pub fn validate(&self) -> Result<(), BTreeMap<String, String>> {
        let mut fields = BTreeMap::new();

        if self.subject.trim().is_empty() {
            fields.insert("subject".into(), "subject is required".into());
        } else if self.subject.chars().count() > MAX_SUBJECT_LEN {
            fields.insert(
                "subject".into(),
                format!("subject must be at most {MAX_SUBJECT_LEN} characters"),
            );
        }

        if self.message.trim().is_empty() {
            fields.insert("message".into(), "message is required".into());
        } else if self.message.chars().count() > MAX_BODY_LEN {
            fields.insert(
                "message".into(),
                format!("message must be at most {MAX_BODY_LEN} characters"),
            );
        }

        if self.from.trim().is_empty() {
            fields.insert("from".into(), "from is required".into());
        } else if self.from.chars().count() > MAX_SENDER_LEN {
            fields.insert(
                "from".into(),
                format!("from must be at most {MAX_SENDER_LEN} characters"),
            );
        }

        if self.to.is_empty() {
            fields.insert("to".into(), "at least one recipient is required".into());
        } else if self.to.len() > MAX_RECIPIENTS {
            fields.insert(
                "to".into(),
                format!("at most {MAX_RECIPIENTS} recipients are allowed"),
            );
        } else if self.to.iter().any(|r| r.trim().is_empty()) {
            fields.insert("to".into(), "recipients must be non-empty".into());
        }

        if let Some(p) = self.priority {
            if p > 2 {
                fields.insert("priority".into(), "priority must be 0, 1, or 2".into());
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(fields)
        }
    }
}
