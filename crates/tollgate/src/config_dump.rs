// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate config`: print the effective configuration.

use tollgate_config::model::{ClockMode, CorruptLedgerPolicy, TollgateConfig};

/// Effective settings as `(key, value)` pairs, with the API key redacted.
pub fn config_entries(config: &TollgateConfig) -> Vec<(&'static str, String)> {
    let clock = match config.budget.clock {
        ClockMode::Local => "local",
        ClockMode::Utc => "utc",
    };
    let corrupt_ledger = match config.budget.corrupt_ledger {
        CorruptLedgerPolicy::Permissive => "permissive",
        CorruptLedgerPolicy::Strict => "strict",
    };
    let api_key = match config.openrouter.api_key.as_deref() {
        Some(key) if !key.is_empty() => "<redacted>".to_string(),
        _ => "<unset>".to_string(),
    };

    vec![
        ("logging.level", config.logging.level.clone()),
        ("access.admin_ids", config.access.admin_ids.join(",")),
        ("access.allowed_user_ids", config.access.allowed_user_ids.join(",")),
        ("access.stats_min_role", config.access.stats_min_role.clone()),
        ("budget.period", config.budget.period.clone()),
        ("budget.guest_budget", config.budget.guest_budget.to_string()),
        ("budget.user_budget", config.budget.user_budget.to_string()),
        ("budget.clock", clock.to_string()),
        ("budget.corrupt_ledger", corrupt_ledger.to_string()),
        ("storage.data_dir", config.storage.data_dir.display().to_string()),
        ("openrouter.api_key", api_key),
        ("openrouter.base_url", config.openrouter.base_url.clone()),
        (
            "openrouter.fetch_timeout_secs",
            config.openrouter.fetch_timeout_secs.to_string(),
        ),
    ]
}

/// Run `tollgate config`.
pub fn run_config(config: &TollgateConfig) {
    let entries = config_entries(config);
    let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in entries {
        println!("{key:<width$} = {value}");
    }
}
