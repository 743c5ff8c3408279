// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenRouter generation cost lookup for Tollgate.
//!
//! [`OpenRouterCostClient`] prices one completed generation through the
//! OpenRouter `/generation` endpoint and implements
//! [`CostSource`](tollgate_core::CostSource), so the usage store can book the
//! result directly.

pub mod client;
pub mod types;

pub use client::OpenRouterCostClient;
