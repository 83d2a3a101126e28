// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the seams between the core pipeline and its
//! external collaborators.

pub mod counter;
pub mod sender;

pub use counter::CounterStore;
pub use sender::{SendReceipt, Sender};
