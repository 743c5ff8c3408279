// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source of "today" for ledger accumulation and aggregation.

use chrono::NaiveDate;

/// Supplies the calendar day used to key ledger entries.
///
/// The usage store never reads the wall clock directly, so billing days can
/// follow server-local time, UTC, or a fixed date in tests.
pub trait Clock: Send + Sync + 'static {
    /// The current billing day.
    fn today(&self) -> NaiveDate;
}
