// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage files across store restarts.

use std::sync::Arc;

use chrono::NaiveDate;
use tollgate_core::BudgetPeriod;
use tollgate_cost::{FixedClock, LoadOutcome, UsageFiles, UsageStore};

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn open_store(dir: &std::path::Path, today: &str) -> UsageStore {
    UsageStore::new(
        UsageFiles::new(dir),
        Arc::new(FixedClock::new(day(today))),
    )
}

/// A restarted store sees exactly what the previous one accumulated.
#[tokio::test]
async fn ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(dir.path(), "2024-06-01");
        store.get_or_create("100", "alice").await.unwrap();
        store.add_cost("100", 0.75).await.unwrap();
        store.add_cost("100", 0.5).await.unwrap();
    }

    let store = open_store(dir.path(), "2024-06-01");
    let record = store.get_or_create("100", "").await.unwrap();
    assert_eq!(record.display_name, "alice");
    assert_eq!(record.ledger.day_total(day("2024-06-01")), 1.25);
    assert_eq!(store.aggregate("100", BudgetPeriod::Daily).await.unwrap(), 1.25);
}

/// A refreshed display name is written without waiting for a cost.
#[tokio::test]
async fn refreshed_display_name_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(dir.path(), "2024-06-01");
        store.get_or_create("500", "alice").await.unwrap();
        let record = store.get_or_create("500", "alice_w").await.unwrap();
        assert_eq!(record.display_name, "alice_w");
    }

    let store = open_store(dir.path(), "2024-06-01");
    let record = store.get_or_create("500", "").await.unwrap();
    assert_eq!(record.display_name, "alice_w");
    assert!(record.ledger.is_empty());
}

/// Deleting a usage file between runs yields a fresh, re-persisted ledger.
#[tokio::test]
async fn deleted_file_self_heals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("200.json");
    {
        let store = open_store(dir.path(), "2024-06-01");
        store.add_cost("200", 3.0).await.unwrap();
    }
    std::fs::remove_file(&path).unwrap();

    let store = open_store(dir.path(), "2024-06-01");
    assert_eq!(store.summary("200").await.unwrap().total, 0.0);
    assert!(path.exists(), "a fresh file should be written on load");
}

/// Files written by earlier deployments load unchanged.
#[tokio::test]
async fn legacy_file_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("300.json"),
        r#"{
  "UserName": "legacy_user",
  "UsageHistory": {
    "ChatCost": {
      "2023-12-30": 0.004,
      "2024-01-02": 0.01,
      "2024-01-31": 0.02
    }
  }
}"#,
    )
    .unwrap();

    let files = UsageFiles::new(dir.path());
    let outcome = files.load("300", "").await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded(_)));

    let store = open_store(dir.path(), "2024-01-31");
    let summary = store.summary("300").await.unwrap();
    assert_eq!(summary.daily, 0.02);
    assert!((summary.monthly - 0.03).abs() < 1e-12);
    assert!((summary.total - 0.034).abs() < 1e-12);
}

/// Malformed day keys mark the whole file corrupt rather than dropping entries.
#[tokio::test]
async fn malformed_day_key_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("400.json"),
        r#"{"UserName":"x","UsageHistory":{"ChatCost":{"2024-13-45":1.0}}}"#,
    )
    .unwrap();

    let outcome = UsageFiles::new(dir.path()).load("400", "x").await.unwrap();
    assert!(outcome.is_recovered());
    assert!(outcome.record().ledger.is_empty());
}
