// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API key hashing.

use ring::digest;

/// SHA-256 hex digest of a raw API key, compared against the
/// `api_key_hash` column during authentication.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(digest::digest(&digest::SHA256, key.as_bytes()))
}
