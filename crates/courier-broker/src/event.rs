// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch event: an immutable per-recipient snapshot carrying
//! everything a worker needs to deliver one notification.

use std::collections::BTreeMap;

use courier_core::types::Platform;
use serde::{Deserialize, Serialize};

/// One queued delivery. Published during ingest (or scheduled release) and
/// consumed by the channel's worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub message_id: String,
    pub recipient_id: String,
    pub to: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    pub timestamp: String,
}
