// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: the budget period and stats role vocabularies, budget
//! ranges, and non-empty paths.

use std::str::FromStr;

use tollgate_core::{BudgetPeriod, Role};

use crate::diagnostic::ConfigError;
use crate::model::TollgateConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TollgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    let period = config.budget.period.trim();
    if period.is_empty() {
        invalid("budget.period must be set to daily, monthly, or total".to_string());
    } else if BudgetPeriod::from_str(period).is_err() {
        invalid(format!(
            "budget.period `{period}` is not one of daily, monthly, total"
        ));
    }

    match Role::from_str(config.access.stats_min_role.trim()) {
        Ok(Role::Admin | Role::User) => {}
        _ => invalid(format!(
            "access.stats_min_role `{}` must be ADMIN or USER",
            config.access.stats_min_role
        )),
    }

    for (key, value) in [
        ("budget.guest_budget", config.budget.guest_budget),
        ("budget.user_budget", config.budget.user_budget),
    ] {
        if !value.is_finite() || value < 0.0 {
            invalid(format!("{key} must be a non-negative number, got {value}"));
        }
    }

    if config.storage.data_dir.as_os_str().is_empty() {
        invalid("storage.data_dir must not be empty".to_string());
    }

    if config.openrouter.fetch_timeout_secs == 0 {
        invalid("openrouter.fetch_timeout_secs must be at least 1".to_string());
    }

    if config.openrouter.base_url.trim().is_empty() {
        invalid("openrouter.base_url must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
