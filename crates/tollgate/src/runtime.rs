// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring from a validated configuration to the shared usage store.

use std::sync::Arc;
use std::time::Duration;

use tollgate_config::model::TollgateConfig;
use tollgate_core::TollgateError;
use tollgate_cost::{AccessPolicy, BudgetPolicy, UsageFiles, UsageStore, clock_for};
use tollgate_openrouter::OpenRouterCostClient;
use tracing::debug;

/// Everything a command needs, built once per process.
pub struct Runtime {
    pub config: TollgateConfig,
    pub store: Arc<UsageStore>,
    pub access: AccessPolicy,
}

impl Runtime {
    pub fn from_config(config: TollgateConfig) -> Result<Self, TollgateError> {
        let policy = BudgetPolicy::from_config(&config)?;
        let files = UsageFiles::new(config.storage.data_dir.clone());
        let store = Arc::new(UsageStore::new(files, clock_for(config.budget.clock)));
        let access = AccessPolicy::new(policy, Arc::clone(&store));

        debug!(
            data_dir = %config.storage.data_dir.display(),
            period = %access.policy().period,
            "usage store ready"
        );
        Ok(Self {
            config,
            store,
            access,
        })
    }

    /// The remote cost client, if an API key is configured.
    pub fn cost_client(&self) -> Result<OpenRouterCostClient, TollgateError> {
        OpenRouterCostClient::from_config(&self.config.openrouter)?.ok_or_else(|| {
            TollgateError::Config(
                "openrouter.api_key is not set (TOLLGATE_OPENROUTER_API_KEY)".to_string(),
            )
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.config.openrouter.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_builds_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TollgateConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        let runtime = Runtime::from_config(config).unwrap();
        assert_eq!(runtime.store.files().dir(), dir.path());
        assert_eq!(runtime.fetch_timeout(), Duration::from_secs(10));
        assert!(matches!(
            runtime.cost_client(),
            Err(TollgateError::Config(_))
        ));
    }
}
