// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the OpenRouter generation endpoint.

use serde::Deserialize;

/// Body of `GET /generation?id=...`.
///
/// Only the fields Tollgate reads are modelled; the rest are ignored.
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    pub data: GenerationData,
}

#[derive(Debug, Deserialize)]
pub struct GenerationData {
    /// Total charge for the generation, in USD.
    pub total_cost: f64,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
    #[serde(default)]
    pub code: Option<u16>,
}
