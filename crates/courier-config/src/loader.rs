// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based configuration loading.
//!
//! TOML files are merged over compiled defaults, most specific last:
//! `/etc/courier/courier.toml`, then the user's XDG config, then
//! `./courier.toml`, with `COURIER_*` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CourierConfig;

/// Load configuration from the standard file hierarchy plus environment
/// overrides. Later sources win: defaults, system file, user XDG file,
/// local `./courier.toml`, then `COURIER_*` variables.
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file("/etc/courier/courier.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("courier/courier.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("courier.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string over the compiled defaults,
/// ignoring files and the environment. Primarily for tests.
pub fn load_config_from_str(toml_content: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider for the `COURIER_` prefix.
///
/// Section names are rewritten to dotted keys one by one rather than with
/// `Env::split("_")`, because several keys contain underscores themselves:
/// `COURIER_RATE_LIMIT_DEFAULT_LIMIT` must become `rate_limit.default_limit`,
/// not `rate.limit.default.limit`.
fn env_provider() -> Env {
    Env::prefixed("COURIER_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("broker_", "broker.", 1)
            .replacen("scheduler_", "scheduler.", 1)
            .replacen("rate_limit_", "rate_limit.", 1)
            .replacen("platforms_", "platforms.", 1)
            .replacen("logging_", "logging.", 1);
        mapped.into()
    })
}
