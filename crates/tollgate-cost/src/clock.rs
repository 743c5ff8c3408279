// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Clock`] implementations.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Local, NaiveDate, Utc};
use tollgate_config::model::ClockMode;
use tollgate_core::Clock;

/// Server-local calendar day.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// UTC calendar day.
#[derive(Debug, Default, Clone, Copy)]
pub struct UtcClock;

impl Clock for UtcClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to a settable day.
#[derive(Debug)]
pub struct FixedClock {
    day: RwLock<NaiveDate>,
}

impl FixedClock {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: RwLock::new(day),
        }
    }

    /// Move the clock to `day`.
    pub fn set(&self, day: NaiveDate) {
        *self.day.write().unwrap_or_else(PoisonError::into_inner) = day;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.day.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The clock selected by `[budget] clock`.
pub fn clock_for(mode: ClockMode) -> Arc<dyn Clock> {
    match mode {
        ClockMode::Local => Arc::new(LocalClock),
        ClockMode::Utc => Arc::new(UtcClock),
    }
}
