// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Courier workspace: a capturing sender with
//! deterministic provider ids and an end-to-end pipeline harness.

pub mod harness;
pub mod sender;

pub use harness::{TestHarness, TEST_API_KEY};
pub use sender::{CapturedSend, CapturingSender};
