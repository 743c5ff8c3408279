// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenRouter generation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tollgate_config::model::OpenRouterConfig;
use tollgate_core::{CostSource, TollgateError};
use tollgate_cost::{Accrual, UsageStore};
use tracing::debug;

use crate::types::{ApiErrorResponse, GenerationResponse};

/// Default OpenRouter API base URL.
const API_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Looks up the cost of completed generations.
///
/// One GET per lookup, no retries. Callers bound the wait with the timeout
/// passed to [`fetch_and_record`](Self::fetch_and_record).
#[derive(Debug, Clone)]
pub struct OpenRouterCostClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterCostClient {
    /// Creates a client authenticated with `api_key`.
    pub fn new(api_key: &str) -> Result<Self, TollgateError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| TollgateError::Config(format!("invalid API key header value: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| TollgateError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Builds a client from `[openrouter]`, or `None` when no API key is set.
    pub fn from_config(config: &OpenRouterConfig) -> Result<Option<Self>, TollgateError> {
        match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => {
                Ok(Some(Self::new(key)?.with_base_url(config.base_url.clone())))
            }
            _ => Ok(None),
        }
    }

    /// Overrides the base URL (self-hosted proxies and tests).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cost in USD of `generation_id`.
    pub async fn fetch_cost(&self, generation_id: &str) -> Result<f64, TollgateError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/generation", self.base_url),
            &[("id", generation_id)],
        )
        .map_err(|e| TollgateError::Config(format!("invalid OpenRouter base URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TollgateError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, generation_id, "generation lookup response received");

        let body = response.text().await.map_err(|e| TollgateError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!("API returned {status}: {}", api_err.error.message),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(TollgateError::Provider {
                message,
                source: None,
            });
        }

        let parsed: GenerationResponse =
            serde_json::from_str(&body).map_err(|e| TollgateError::Provider {
                message: format!("failed to parse generation response: {e}"),
                source: Some(Box::new(e)),
            })?;

        let cost = parsed.data.total_cost;
        if !cost.is_finite() || cost < 0.0 {
            return Err(TollgateError::Provider {
                message: format!("generation {generation_id} reported invalid cost {cost}"),
                source: None,
            });
        }
        Ok(cost)
    }

    /// Fetch `generation_id`'s cost and add it to `user_id`'s ledger.
    ///
    /// Nothing is recorded if the lookup fails or exceeds `timeout`.
    pub async fn fetch_and_record(
        &self,
        store: &UsageStore,
        generation_id: &str,
        user_id: &str,
        timeout: Duration,
    ) -> Result<Accrual, TollgateError> {
        store
            .record_generation(self, generation_id, user_id, timeout)
            .await
    }
}

#[async_trait]
impl CostSource for OpenRouterCostClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn generation_cost(&self, generation_id: &str) -> Result<f64, TollgateError> {
        self.fetch_cost(generation_id).await
    }
}
