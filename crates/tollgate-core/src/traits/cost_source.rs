// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote metering trait for resolving the cost of one generation.

use async_trait::async_trait;

use crate::error::TollgateError;

/// Resolves the monetary cost of a completed generation by its remote id.
///
/// Implementations issue exactly one request per call and never retry;
/// callers decide whether a failure is worth another attempt.
#[async_trait]
pub trait CostSource: Send + Sync + 'static {
    /// Human-readable name of the metering backend.
    fn name(&self) -> &str;

    /// Returns the total cost reported for `generation_id`.
    async fn generation_cost(&self, generation_id: &str) -> Result<f64, TollgateError>;
}
