// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tollgate usage tracker.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Tollgate configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TollgateConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Role assignment and statistics visibility.
    #[serde(default)]
    pub access: AccessConfig,

    /// Spending limits and the aggregation window.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Where per-user usage files live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote metering endpoint used to price generations.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Role assignment configuration.
///
/// Identifiers are opaque strings. Lists may be written as TOML arrays of
/// strings or integers, or as one comma-separated string.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Identifiers that resolve to the ADMIN role.
    #[serde(default, deserialize_with = "ids::deserialize")]
    pub admin_ids: Vec<String>,

    /// Identifiers that resolve to the USER role (unless also admins).
    #[serde(default, deserialize_with = "ids::deserialize")]
    pub allowed_user_ids: Vec<String>,

    /// Lowest role allowed to view usage statistics (`ADMIN` or `USER`).
    #[serde(default = "default_stats_min_role")]
    pub stats_min_role: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            allowed_user_ids: Vec::new(),
            stats_min_role: default_stats_min_role(),
        }
    }
}

fn default_stats_min_role() -> String {
    "ADMIN".to_string()
}

/// Which calendar decides what "today" is when keying ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Server-local wall clock.
    #[default]
    Local,
    /// UTC regardless of server time zone.
    Utc,
}

/// How access checks treat a user whose usage file failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptLedgerPolicy {
    /// Treat the user as having zero usage.
    #[default]
    Permissive,
    /// Deny non-admins until the file is repaired and the process restarted.
    Strict,
}

/// Budget configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Aggregation window: `daily`, `monthly`, or `total`.
    #[serde(default = "default_period")]
    pub period: String,

    /// Spending limit for users in no identifier set.
    #[serde(default)]
    pub guest_budget: f64,

    /// Spending limit for allowed users.
    #[serde(default)]
    pub user_budget: f64,

    /// Calendar used for "today".
    #[serde(default)]
    pub clock: ClockMode,

    /// Access posture for users whose ledger could not be read.
    #[serde(default)]
    pub corrupt_ledger: CorruptLedgerPolicy,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            period: default_period(),
            guest_budget: 0.0,
            user_budget: 0.0,
            clock: ClockMode::default(),
            corrupt_ledger: CorruptLedgerPolicy::default(),
        }
    }
}

fn default_period() -> String {
    "monthly".to_string()
}

/// Usage file storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding one `<user_id>.json` file per user.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("tollgate").join("usage"))
        .unwrap_or_else(|| PathBuf::from("usage"))
}

/// OpenRouter metering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenRouterConfig {
    /// Bearer token for the generation endpoint. `None` disables remote pricing.
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL; the generation endpoint is `{base_url}/generation`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on a single cost lookup, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

/// Lenient identifier-list deserialization.
mod ids {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Text(String),
        Number(i64),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum List {
        Joined(String),
        Single(i64),
        Many(Vec<Entry>),
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ids = match List::deserialize(deserializer)? {
            List::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            List::Single(id) => vec![id.to_string()],
            List::Many(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    Entry::Text(id) => id.trim().to_string(),
                    Entry::Number(id) => id.to_string(),
                })
                .filter(|id| !id.is_empty())
                .collect(),
        };
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_accept_strings_and_numbers() {
        let config: TollgateConfig = toml::from_str(
            r#"
[access]
admin_ids = [123, "alice"]
allowed_user_ids = "456, 789 ,,"
"#,
        )
        .unwrap();
        assert_eq!(config.access.admin_ids, vec!["123", "alice"]);
        assert_eq!(config.access.allowed_user_ids, vec!["456", "789"]);
    }

    #[test]
    fn clock_and_corrupt_policy_parse_lowercase() {
        let config: TollgateConfig = toml::from_str(
            r#"
[budget]
clock = "utc"
corrupt_ledger = "strict"
"#,
        )
        .unwrap();
        assert_eq!(config.budget.clock, ClockMode::Utc);
        assert_eq!(config.budget.corrupt_ledger, CorruptLedgerPolicy::Strict);
    }

    #[test]
    fn unknown_clock_mode_is_rejected() {
        let result = toml::from_str::<TollgateConfig>(
            r#"
[budget]
clock = "martian"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn data_dir_default_ends_with_usage() {
        let config = StorageConfig::default();
        assert!(config.data_dir.ends_with("usage"));
    }
}
