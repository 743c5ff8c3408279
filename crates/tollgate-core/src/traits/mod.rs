// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the usage store and its collaborators.

pub mod clock;
pub mod cost_source;

pub use clock::Clock;
pub use cost_source::CostSource;
