// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user cost tracking and budget-gated access for Tollgate.
//!
//! This crate provides:
//! - **Cost ledger**: day-keyed, accumulate-only cost history per user
//! - **Persistence**: one JSON file per user, written atomically and healed on load
//! - **Usage store**: shared per-user ledgers with daily/monthly/total aggregation
//! - **Access policy**: role resolution and strict budget checks

pub mod clock;
pub mod ledger;
pub mod persist;
pub mod policy;
pub mod record;
pub mod store;

pub use clock::{FixedClock, LocalClock, UtcClock, clock_for};
pub use ledger::CostLedger;
pub use persist::{LoadOutcome, SaveOutcome, UsageFiles};
pub use policy::{AccessDecision, AccessPolicy, BudgetPolicy, DenyReason};
pub use record::UsageRecord;
pub use store::{Accrual, NamedAggregate, UsageStore, UserUsage};
