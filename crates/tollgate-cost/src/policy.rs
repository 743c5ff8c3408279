// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role resolution and budget-gated access decisions.

use std::collections::HashSet;
use std::sync::Arc;

use tollgate_config::model::{CorruptLedgerPolicy, TollgateConfig};
use tollgate_core::{BudgetPeriod, Role, TollgateError};
use tracing::{debug, warn};

use crate::store::UsageStore;

/// Budget limits and identifier sets, resolved from configuration.
#[derive(Debug, Clone)]
pub struct BudgetPolicy {
    pub guest_budget: f64,
    pub member_budget: f64,
    pub admin_ids: HashSet<String>,
    pub member_ids: HashSet<String>,
    pub period: BudgetPeriod,
    pub stats_min_role: Role,
    pub corrupt_ledger: CorruptLedgerPolicy,
}

impl BudgetPolicy {
    /// Build the policy from a validated configuration.
    pub fn from_config(config: &TollgateConfig) -> Result<Self, TollgateError> {
        let period = config.budget.period.trim().parse::<BudgetPeriod>().map_err(|_| {
            TollgateError::Config(format!(
                "unknown budget period `{}`",
                config.budget.period
            ))
        })?;
        let stats_min_role = match config.access.stats_min_role.trim().parse::<Role>() {
            Ok(role @ (Role::Admin | Role::User)) => role,
            _ => {
                return Err(TollgateError::Config(format!(
                    "stats_min_role must be ADMIN or USER, got `{}`",
                    config.access.stats_min_role
                )));
            }
        };

        Ok(Self {
            guest_budget: config.budget.guest_budget,
            member_budget: config.budget.user_budget,
            admin_ids: config.access.admin_ids.iter().cloned().collect(),
            member_ids: config.access.allowed_user_ids.iter().cloned().collect(),
            period,
            stats_min_role,
            corrupt_ledger: config.budget.corrupt_ledger,
        })
    }

    /// Admin membership wins over member membership.
    pub fn role(&self, user_id: &str) -> Role {
        if self.admin_ids.contains(user_id) {
            Role::Admin
        } else if self.member_ids.contains(user_id) {
            Role::User
        } else {
            Role::Guest
        }
    }

    /// Spending limit for `role`. Admins have none.
    pub fn budget_for(&self, role: Role) -> Option<f64> {
        match role {
            Role::Admin => None,
            Role::User => Some(self.member_budget),
            Role::Guest => Some(self.guest_budget),
        }
    }

    pub fn can_view_stats(&self, user_id: &str) -> bool {
        match self.role(user_id) {
            Role::Admin => true,
            Role::User => self.stats_min_role == Role::User,
            Role::Guest => false,
        }
    }
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Spend for the period reached the role's budget.
    BudgetExhausted,
    /// The user's ledger could not be read.
    LedgerUnavailable,
}

/// Result of an access check, with enough context to explain it.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub role: Role,
    /// Spend over the configured period. `None` for admins.
    pub spent: Option<f64>,
    /// The role's budget. `None` for admins.
    pub budget: Option<f64>,
    pub deny_reason: Option<DenyReason>,
}

impl AccessDecision {
    fn allow(role: Role, spent: Option<f64>, budget: Option<f64>) -> Self {
        Self {
            allowed: true,
            role,
            spent,
            budget,
            deny_reason: None,
        }
    }

    fn deny(role: Role, spent: Option<f64>, budget: Option<f64>, reason: DenyReason) -> Self {
        Self {
            allowed: false,
            role,
            spent,
            budget,
            deny_reason: Some(reason),
        }
    }
}

/// Evaluates [`BudgetPolicy`] against live usage.
pub struct AccessPolicy {
    policy: BudgetPolicy,
    store: Arc<UsageStore>,
}

impl AccessPolicy {
    pub fn new(policy: BudgetPolicy, store: Arc<UsageStore>) -> Self {
        Self { policy, store }
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<UsageStore> {
        &self.store
    }

    pub fn role(&self, user_id: &str) -> Role {
        self.policy.role(user_id)
    }

    pub fn can_view_stats(&self, user_id: &str) -> bool {
        self.policy.can_view_stats(user_id)
    }

    /// Decide whether `user_id` may make another metered call.
    ///
    /// Non-admins are allowed while period spend is strictly below their
    /// budget, so a zero budget always denies.
    pub async fn has_access(&self, user_id: &str) -> AccessDecision {
        let role = self.policy.role(user_id);
        let Some(budget) = self.policy.budget_for(role) else {
            debug!(user_id, %role, "admin access granted");
            return AccessDecision::allow(role, None, None);
        };

        let usage = match self.store.usage(user_id).await {
            Ok(usage) => usage,
            Err(e) => {
                warn!(user_id, error = %e, "usage lookup failed, denying access");
                return AccessDecision::deny(
                    role,
                    None,
                    Some(budget),
                    DenyReason::LedgerUnavailable,
                );
            }
        };
        let spent = usage.summary.for_period(self.policy.period);

        if usage.recovered_from_corrupt && self.policy.corrupt_ledger == CorruptLedgerPolicy::Strict
        {
            warn!(user_id, "usage ledger was unreadable, denying access");
            return AccessDecision::deny(
                role,
                Some(spent),
                Some(budget),
                DenyReason::LedgerUnavailable,
            );
        }

        let allowed = budget > 0.0 && spent < budget;
        debug!(user_id, %role, spent, budget, allowed, period = %self.policy.period, "access evaluated");
        if allowed {
            AccessDecision::allow(role, Some(spent), Some(budget))
        } else {
            AccessDecision::deny(
                role,
                Some(spent),
                Some(budget),
                DenyReason::BudgetExhausted,
            )
        }
    }
}
