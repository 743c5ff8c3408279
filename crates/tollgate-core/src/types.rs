// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the configuration, cost, and binary crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Access tier derived from the configured identifier sets.
///
/// Ordered from least to most privileged.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Not listed in any identifier set.
    Guest,
    /// Listed in the allowed-member set.
    User,
    /// Listed in the admin set. Never budget-limited.
    Admin,
}

/// Window over which ledger entries are summed for budget checks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    /// Today's entry only.
    Daily,
    /// Every entry in today's calendar month.
    Monthly,
    /// Every entry ever recorded.
    Total,
}

/// Daily, monthly, and total spend taken from one ledger snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub daily: f64,
    pub monthly: f64,
    pub total: f64,
}

impl UsageSummary {
    /// The component of the summary matching `period`.
    pub fn for_period(&self, period: BudgetPeriod) -> f64 {
        match period {
            BudgetPeriod::Daily => self.daily,
            BudgetPeriod::Monthly => self.monthly,
            BudgetPeriod::Total => self.total,
        }
    }
}
