// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Courier dispatch service.
//!
//! TOML files merged over compiled defaults, overridden by `COURIER_*`
//! environment variables. Provider secrets never pass through here.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::CourierConfig;
