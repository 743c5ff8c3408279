// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared per-user usage store.
//!
//! Each user gets a slot that is loaded from disk once, on first access.
//! Accumulation mutates the slot under a `std::sync::Mutex`, takes a
//! revisioned snapshot, releases the lock, and only then awaits the file
//! write. The ledger lock is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tollgate_core::{BudgetPeriod, Clock, CostSource, TollgateError, UsageSummary};
use tracing::{debug, info, warn};

use crate::persist::{LoadOutcome, UsageFiles};
use crate::record::UsageRecord;

/// Outcome of a successful cost accumulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accrual {
    /// Day the cost was booked against.
    pub day: NaiveDate,
    /// The amount added.
    pub amount: f64,
    /// That day's total after the accumulation.
    pub day_total: f64,
    /// Whether the updated record reached the disk.
    pub saved: bool,
}

/// Aggregate for a period given by name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAggregate {
    pub amount: f64,
    /// Set when the period name was not recognized and `amount` is zero.
    pub warning: Option<String>,
}

/// A user's usage summary plus ledger integrity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserUsage {
    pub summary: UsageSummary,
    /// The user's file was unreadable when first loaded.
    pub recovered_from_corrupt: bool,
}

struct SlotState {
    record: UsageRecord,
    revision: u64,
}

struct UserSlot {
    state: Mutex<SlotState>,
    recovered_from_corrupt: bool,
}

impl UserSlot {
    fn new(record: UsageRecord, recovered_from_corrupt: bool) -> Self {
        Self {
            state: Mutex::new(SlotState {
                record,
                revision: 0,
            }),
            recovered_from_corrupt,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // Every critical section leaves the record consistent, so a panic
        // elsewhere does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-user ledgers backed by [`UsageFiles`].
///
/// Built once and shared as `Arc<UsageStore>`.
pub struct UsageStore {
    files: UsageFiles,
    clock: Arc<dyn Clock>,
    slots: DashMap<String, Arc<OnceCell<Arc<UserSlot>>>>,
}

impl UsageStore {
    pub fn new(files: UsageFiles, clock: Arc<dyn Clock>) -> Self {
        Self {
            files,
            clock,
            slots: DashMap::new(),
        }
    }

    pub fn files(&self) -> &UsageFiles {
        &self.files
    }

    /// The day accumulations are currently booked against.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    async fn slot(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<Arc<UserSlot>, TollgateError> {
        crate::persist::validate_user_id(user_id)?;
        let cell = self.slots.entry(user_id.to_string()).or_default().clone();
        let slot = cell
            .get_or_init(|| self.load_slot(user_id, display_name))
            .await;
        Ok(Arc::clone(slot))
    }

    async fn load_slot(&self, user_id: &str, display_name: &str) -> Arc<UserSlot> {
        let slot = match self.files.load(user_id, display_name).await {
            Ok(LoadOutcome::Loaded(record)) => UserSlot::new(record, false),
            Ok(LoadOutcome::Created(record)) => {
                debug!(user_id, "created usage record");
                UserSlot::new(record, false)
            }
            // Already logged by the persistence layer.
            Ok(LoadOutcome::Recovered { record, .. }) => UserSlot::new(record, true),
            Err(e) => {
                warn!(user_id, error = %e, "failed to read usage file, starting from an empty ledger");
                UserSlot::new(UsageRecord::new(user_id, display_name), true)
            }
        };
        Arc::new(slot)
    }

    /// Return `user_id`'s record, loading or creating it on first access.
    ///
    /// A non-empty `display_name` that differs from the stored one replaces
    /// it and the record is written back. A failed write is logged only.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<UsageRecord, TollgateError> {
        let slot = self.slot(user_id, display_name).await?;
        let (snapshot, refreshed) = {
            let mut state = slot.lock();
            if state.record.refresh_display_name(display_name) {
                state.revision += 1;
                (state.record.clone(), Some(state.revision))
            } else {
                (state.record.clone(), None)
            }
        };

        if let Some(revision) = refreshed {
            debug!(user_id, display_name, "display name refreshed");
            if let Err(e) = self.files.save_revision(&snapshot, revision).await {
                warn!(user_id, revision, error = %e, "failed to persist display name");
            }
        }
        Ok(snapshot)
    }

    /// Add `amount` to today's entry for `user_id` and persist the record.
    ///
    /// A failed write is logged and reported through [`Accrual::saved`]; the
    /// in-memory ledger keeps the accumulation either way.
    pub async fn add_cost(&self, user_id: &str, amount: f64) -> Result<Accrual, TollgateError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(TollgateError::InvalidAmount(amount));
        }
        let slot = self.slot(user_id, "").await?;
        let day = self.clock.today();

        let (snapshot, revision, day_total) = {
            let mut state = slot.lock();
            let day_total = state.record.ledger.accumulate(day, amount)?;
            state.revision += 1;
            (state.record.clone(), state.revision, day_total)
        };

        let saved = match self.files.save_revision(&snapshot, revision).await {
            Ok(_) => true,
            Err(e) => {
                warn!(user_id, revision, error = %e, "failed to persist usage record");
                false
            }
        };

        info!(user_id, amount, %day, day_total, saved, "cost recorded");
        Ok(Accrual {
            day,
            amount,
            day_total,
            saved,
        })
    }

    /// Sum of `user_id`'s costs over `period`.
    pub async fn aggregate(
        &self,
        user_id: &str,
        period: BudgetPeriod,
    ) -> Result<f64, TollgateError> {
        Ok(self.summary(user_id).await?.for_period(period))
    }

    /// Like [`aggregate`](Self::aggregate) with the period given by name.
    ///
    /// An unknown name yields zero and a warning.
    pub async fn aggregate_named(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<NamedAggregate, TollgateError> {
        match period.parse::<BudgetPeriod>() {
            Ok(period) => Ok(NamedAggregate {
                amount: self.aggregate(user_id, period).await?,
                warning: None,
            }),
            Err(_) => {
                warn!(user_id, period, "unknown budget period, reporting zero usage");
                Ok(NamedAggregate {
                    amount: 0.0,
                    warning: Some(format!(
                        "unknown budget period `{period}` (expected daily, monthly, or total)"
                    )),
                })
            }
        }
    }

    /// Daily, monthly, and total for `user_id` from one snapshot.
    pub async fn summary(&self, user_id: &str) -> Result<UsageSummary, TollgateError> {
        Ok(self.usage(user_id).await?.summary)
    }

    /// Summary plus whether the user's file was unreadable at load time.
    pub async fn usage(&self, user_id: &str) -> Result<UserUsage, TollgateError> {
        let slot = self.slot(user_id, "").await?;
        let today = self.clock.today();
        let summary = slot.lock().record.ledger.summary(today);
        Ok(UserUsage {
            summary,
            recovered_from_corrupt: slot.recovered_from_corrupt,
        })
    }

    /// Snapshot of an already loaded record. Never touches the disk.
    pub fn record(&self, user_id: &str) -> Option<UsageRecord> {
        let cell = self.slots.get(user_id)?.clone();
        let slot = cell.get()?;
        Some(slot.lock().record.clone())
    }

    /// Identifiers of every loaded user, sorted.
    pub fn loaded_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        users.sort();
        users
    }

    /// Price `generation_id` through `source` and book it to `user_id`.
    ///
    /// Nothing is accumulated unless the lookup succeeds within `timeout`.
    pub async fn record_generation(
        &self,
        source: &dyn CostSource,
        generation_id: &str,
        user_id: &str,
        timeout: Duration,
    ) -> Result<Accrual, TollgateError> {
        let cost = match tokio::time::timeout(timeout, source.generation_cost(generation_id)).await
        {
            Ok(Ok(cost)) => cost,
            Ok(Err(e)) => {
                warn!(source = source.name(), generation_id, error = %e, "cost lookup failed");
                return Err(e);
            }
            Err(_) => {
                warn!(source = source.name(), generation_id, ?timeout, "cost lookup timed out");
                return Err(TollgateError::Timeout { duration: timeout });
            }
        };
        self.add_cost(user_id, cost).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::clock::FixedClock;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn store_at(dir: &std::path::Path, today: &str) -> (Arc<UsageStore>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(day(today)));
        let store = UsageStore::new(UsageFiles::new(dir), clock.clone());
        (Arc::new(store), clock)
    }

    #[tokio::test]
    async fn period_windows_follow_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = store_at(dir.path(), "2024-01-15");
        store.add_cost("u", 3.0).await.unwrap();
        clock.set(day("2024-01-31"));
        store.add_cost("u", 2.0).await.unwrap();
        clock.set(day("2024-02-01"));
        store.add_cost("u", 5.0).await.unwrap();
        clock.set(day("2024-01-31"));

        let summary = store.summary("u").await.unwrap();
        assert_eq!(summary.daily, 2.0);
        assert_eq!(summary.monthly, 5.0);
        assert_eq!(summary.total, 10.0);
        assert_eq!(store.aggregate("u", BudgetPeriod::Monthly).await.unwrap(), 5.0);
    }

    #[tokio::test]
    async fn add_cost_reports_day_total_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");

        let first = store.add_cost("42", 0.5).await.unwrap();
        let second = store.add_cost("42", 0.25).await.unwrap();
        assert_eq!(first.day, day("2024-03-10"));
        assert_eq!(second.day_total, 0.75);
        assert!(second.saved);

        let on_disk = UsageFiles::new(dir.path())
            .load("42", "")
            .await
            .unwrap()
            .into_record();
        assert_eq!(on_disk.ledger.day_total(day("2024-03-10")), 0.75);
    }

    #[tokio::test]
    async fn invalid_amount_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");
        store.add_cost("42", 1.0).await.unwrap();

        for bad in [-0.1, f64::NAN, f64::NEG_INFINITY] {
            let err = store.add_cost("42", bad).await.unwrap_err();
            assert!(matches!(err, TollgateError::InvalidAmount(_)));
        }
        assert_eq!(store.summary("42").await.unwrap().total, 1.0);
    }

    #[tokio::test]
    async fn get_or_create_refreshes_display_name() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");

        let record = store.get_or_create("42", "alice").await.unwrap();
        assert_eq!(record.display_name, "alice");
        assert!(record.ledger.is_empty());

        let record = store.get_or_create("42", "").await.unwrap();
        assert_eq!(record.display_name, "alice");

        let record = store.get_or_create("42", "alice_w").await.unwrap();
        assert_eq!(record.display_name, "alice_w");
        assert_eq!(store.record("42").unwrap().display_name, "alice_w");
    }

    #[tokio::test]
    async fn record_is_none_until_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");
        assert!(store.record("42").is_none());
        store.get_or_create("42", "x").await.unwrap();
        assert!(store.record("42").is_some());
        assert_eq!(store.loaded_users(), vec!["42".to_string()]);
    }

    #[tokio::test]
    async fn invalid_user_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");
        let err = store.add_cost("../x", 1.0).await.unwrap_err();
        assert!(matches!(err, TollgateError::InvalidUserId(_)));
        assert!(store.loaded_users().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accumulations_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");
        let n = 64;

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.add_cost("u", 1.0).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.summary("u").await.unwrap().total, f64::from(n));
        let on_disk = UsageFiles::new(dir.path())
            .load("u", "")
            .await
            .unwrap()
            .into_record();
        assert_eq!(on_disk.ledger.total(), f64::from(n));
    }

    #[tokio::test]
    #[traced_test]
    async fn unknown_period_yields_zero_and_warning() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");
        store.add_cost("u", 4.0).await.unwrap();

        let named = store.aggregate_named("u", "weekly").await.unwrap();
        assert_eq!(named.amount, 0.0);
        assert!(named.warning.unwrap().contains("weekly"));
        assert!(logs_contain("unknown budget period"));

        let named = store.aggregate_named("u", "total").await.unwrap();
        assert_eq!(named.amount, 4.0);
        assert!(named.warning.is_none());
    }

    #[tokio::test]
    async fn failed_save_keeps_memory_authoritative() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let (store, _) = store_at(&blocker, "2024-03-10");

        let accrual = store.add_cost("u", 2.0).await.unwrap();
        assert!(!accrual.saved);
        assert_eq!(store.summary("u").await.unwrap().daily, 2.0);
    }

    #[tokio::test]
    async fn corrupt_file_is_flagged_and_later_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u.json");
        std::fs::write(&path, "garbage").unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");

        let usage = store.usage("u").await.unwrap();
        assert!(usage.recovered_from_corrupt);
        assert_eq!(usage.summary.total, 0.0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");

        assert!(store.add_cost("u", 1.0).await.unwrap().saved);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("ChatCost"));
    }

    struct FixedCost(f64);

    #[async_trait]
    impl CostSource for FixedCost {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generation_cost(&self, _generation_id: &str) -> Result<f64, TollgateError> {
            Ok(self.0)
        }
    }

    struct SlowCost;

    #[async_trait]
    impl CostSource for SlowCost {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generation_cost(&self, _generation_id: &str) -> Result<f64, TollgateError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1.0)
        }
    }

    #[tokio::test]
    async fn record_generation_books_fetched_cost() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");

        let accrual = store
            .record_generation(&FixedCost(0.012), "gen-1", "u", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(accrual.day_total, 0.012);
    }

    #[tokio::test]
    async fn record_generation_timeout_books_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_at(dir.path(), "2024-03-10");

        let err = store
            .record_generation(&SlowCost, "gen-1", "u", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::Timeout { .. }));
        assert_eq!(store.summary("u").await.unwrap().total, 0.0);
    }
}
