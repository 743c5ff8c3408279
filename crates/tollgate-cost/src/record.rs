// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-user usage record owned by the usage store.

use crate::ledger::CostLedger;

/// One user's identity and cost history.
///
/// The user id names the file on disk and is not stored inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub user_id: String,
    pub display_name: String,
    pub ledger: CostLedger,
}

impl UsageRecord {
    /// A record with an empty ledger.
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            ledger: CostLedger::new(),
        }
    }

    /// Replace the display name when `name` is non-empty and different.
    ///
    /// Returns `true` if the name changed.
    pub fn refresh_display_name(&mut self, name: &str) -> bool {
        if name.is_empty() || self.display_name == name {
            return false;
        }
        self.display_name = name.to_string();
        true
    }
}
