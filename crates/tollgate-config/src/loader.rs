// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tollgate.toml` > `~/.config/tollgate/tollgate.toml`
//! > `/etc/tollgate/tollgate.toml`, with environment variable overrides via the
//! `TOLLGATE_` prefix. The unprefixed variable names used by earlier bot
//! deployments (`BUDGET_PERIOD`, `ADMIN_IDS`, ...) are honored as a lower
//! priority layer.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TollgateConfig;

/// Config file name looked up in each hierarchy directory.
pub const CONFIG_FILE_NAME: &str = "tollgate.toml";

/// System-wide config path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tollgate/tollgate.toml";

/// Unprefixed variable names accepted for compatibility, with their config keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("budget_period", "budget.period"),
    ("guest_budget", "budget.guest_budget"),
    ("user_budget", "budget.user_budget"),
    ("admin_ids", "access.admin_ids"),
    ("allowed_user_ids", "access.allowed_user_ids"),
    ("stats_min_role", "access.stats_min_role"),
    ("api_key", "openrouter.api_key"),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tollgate/tollgate.toml` (system-wide)
/// 3. `~/.config/tollgate/tollgate.toml` (user XDG config)
/// 4. `./tollgate.toml` (local directory)
/// 5. Legacy unprefixed environment variables
/// 6. `TOLLGATE_*` environment variables
pub fn load_config() -> Result<TollgateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TollgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TollgateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TollgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TollgateConfig::default()))
        .merge(Toml::file(path))
        .merge(legacy_env_provider())
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the default config lookup.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TollgateConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tollgate").join(CONFIG_FILE_NAME))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(CONFIG_FILE_NAME))
        .merge(legacy_env_provider())
        .merge(env_provider())
}

/// Map `TOLLGATE_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `TOLLGATE_BUDGET_GUEST_BUDGET` must become
/// `budget.guest_budget`, not `budget.guest.budget`.
fn env_provider() -> Env {
    Env::prefixed("TOLLGATE_").map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

fn legacy_env_provider() -> Env {
    Env::raw()
        .only(&LEGACY_ENV_KEYS.iter().map(|(k, _)| *k).collect::<Vec<_>>())
        .map(|key| {
            let lowered = key.as_str().to_ascii_lowercase();
            LEGACY_ENV_KEYS
                .iter()
                .find(|(legacy, _)| *legacy == lowered)
                .map(|(_, mapped)| (*mapped).to_string())
                .unwrap_or(lowered)
                .into()
        })
}

/// Convert a lowercased, prefix-stripped env key into a dotted config path.
pub fn map_env_key(key: &str) -> String {
    const SECTIONS: &[&str] = &["logging", "access", "budget", "storage", "openrouter"];

    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
