// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user cost ledger keyed by calendar day.
//!
//! The ledger is accumulate-only: entries are created at zero and only ever
//! increased. Days are typed as [`NaiveDate`], so a malformed day key cannot
//! be represented and fails to deserialize.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tollgate_core::{BudgetPeriod, TollgateError, UsageSummary};

/// Mapping from calendar day to the cost accumulated on that day.
///
/// Serializes as a JSON object of `"YYYY-MM-DD": cost` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostLedger {
    entries: BTreeMap<NaiveDate, f64>,
}

impl CostLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the entry for `day` and return the day's new total.
    ///
    /// Rejects negative and non-finite amounts without touching the ledger.
    pub fn accumulate(&mut self, day: NaiveDate, amount: f64) -> Result<f64, TollgateError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(TollgateError::InvalidAmount(amount));
        }
        let entry = self.entries.entry(day).or_insert(0.0);
        *entry += amount;
        Ok(*entry)
    }

    /// Cost recorded on `day`, or zero.
    pub fn day_total(&self, day: NaiveDate) -> f64 {
        self.entries.get(&day).copied().unwrap_or(0.0)
    }

    /// Sum of every entry in the same calendar month as `day`.
    pub fn month_total(&self, day: NaiveDate) -> f64 {
        self.entries
            .iter()
            .filter(|(d, _)| d.year() == day.year() && d.month() == day.month())
            .map(|(_, cost)| cost)
            .sum()
    }

    /// Sum of every entry.
    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Sum over `period` relative to `today`.
    pub fn aggregate(&self, period: BudgetPeriod, today: NaiveDate) -> f64 {
        match period {
            BudgetPeriod::Daily => self.day_total(today),
            BudgetPeriod::Monthly => self.month_total(today),
            BudgetPeriod::Total => self.total(),
        }
    }

    /// Daily, monthly, and total sums relative to `today`.
    pub fn summary(&self, today: NaiveDate) -> UsageSummary {
        UsageSummary {
            daily: self.day_total(today),
            monthly: self.month_total(today),
            total: self.total(),
        }
    }

    /// Entries in ascending day order.
    pub fn entries(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.entries.iter().map(|(day, cost)| (*day, *cost))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first entry violating the non-negative, finite invariant, if any.
    pub fn find_invalid(&self) -> Option<(NaiveDate, f64)> {
        self.entries()
            .find(|(_, cost)| !cost.is_finite() || *cost < 0.0)
    }
}

impl FromIterator<(NaiveDate, f64)> for CostLedger {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
