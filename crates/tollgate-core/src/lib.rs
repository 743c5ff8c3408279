// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tollgate usage tracker.
//!
//! This crate provides the error type, shared enums, and the trait seams
//! (clock and remote cost source) used throughout the Tollgate workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TollgateError;
pub use traits::{Clock, CostSource};
pub use types::{BudgetPeriod, Role, UsageSummary};
