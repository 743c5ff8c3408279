// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate stats` command implementation.
//!
//! Shows a user's daily, monthly, and total spend against their budget.
//! Visibility is gated by `[access] stats_min_role` for the viewer.

use std::io::IsTerminal;

use serde::Serialize;
use tollgate_core::{Role, TollgateError};

use crate::runtime::Runtime;

/// Structured stats output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub today: String,
    pub period: String,
    pub daily: f64,
    pub monthly: f64,
    pub total: f64,
    pub budget: Option<f64>,
    pub remaining: Option<f64>,
}

fn remaining(spent: f64, budget: Option<f64>) -> Option<f64> {
    budget.map(|b| (b - spent).max(0.0))
}

/// Format a USD amount with precision suited to sub-cent API costs.
fn format_cost(amount: f64) -> String {
    if amount != 0.0 && amount.abs() < 0.01 {
        format!("${amount:.6}")
    } else {
        format!("${amount:.2}")
    }
}

/// Run the `tollgate stats` command.
///
/// `viewer` defaults to the user being inspected. Returns `false` when the
/// viewer may not see statistics.
pub async fn run_stats(
    runtime: &Runtime,
    user_id: &str,
    viewer: Option<&str>,
    json: bool,
    plain: bool,
) -> Result<bool, TollgateError> {
    let viewer = viewer.unwrap_or(user_id);
    if !runtime.access.can_view_stats(viewer) {
        eprintln!(
            "tollgate: {viewer} ({}) may not view usage statistics",
            runtime.access.role(viewer)
        );
        return Ok(false);
    }

    let record = runtime.store.get_or_create(user_id, "").await?;
    let today = runtime.store.today();
    let summary = record.ledger.summary(today);
    let policy = runtime.access.policy();
    let role = policy.role(user_id);
    let budget = policy.budget_for(role);
    let spent = summary.for_period(policy.period);

    let response = StatsResponse {
        user_id: user_id.to_string(),
        display_name: record.display_name,
        role,
        today: today.to_string(),
        period: policy.period.to_string(),
        daily: summary.daily,
        monthly: summary.monthly,
        total: summary.total,
        budget,
        remaining: remaining(spent, budget),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_stats(&response, spent, use_color);
    }
    Ok(true)
}

/// Print stats with optional colors.
fn print_stats(stats: &StatsResponse, spent: f64, use_color: bool) {
    let name = if stats.display_name.is_empty() {
        stats.user_id.clone()
    } else {
        format!("{} ({})", stats.display_name, stats.user_id)
    };

    println!();
    println!("  tollgate stats: {name}");
    println!("  {}", "-".repeat(35));
    println!("    Role:     {}", stats.role);
    println!("    Today:    {}", format_cost(stats.daily));
    println!("    Month:    {}", format_cost(stats.monthly));
    println!("    Total:    {}", format_cost(stats.total));

    match stats.budget {
        Some(budget) => {
            let line = format!(
                "{} of {} ({})",
                format_cost(spent),
                format_cost(budget),
                stats.period
            );
            let exhausted = !(budget > 0.0 && spent < budget);
            if use_color {
                use colored::Colorize;
                if exhausted {
                    println!("    Budget:   {} {}", "✗".red(), line.red());
                } else {
                    println!("    Budget:   {} {}", "✓".green(), line.green());
                }
            } else if exhausted {
                println!("    Budget:   [EXHAUSTED] {line}");
            } else {
                println!("    Budget:   [OK] {line}");
            }
        }
        None => println!("    Budget:   unlimited"),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_cost_small_amounts_keep_precision() {
        assert_eq!(format_cost(0.000125), "$0.000125");
        assert_eq!(format_cost(0.0), "$0.00");
        assert_eq!(format_cost(12.5), "$12.50");
    }

    #[test]
    fn remaining_never_negative() {
        assert_eq!(remaining(12.0, Some(10.0)), Some(0.0));
        assert_eq!(remaining(4.0, Some(10.0)), Some(6.0));
        assert_eq!(remaining(4.0, None), None);
    }

    #[test]
    fn stats_response_serializes() {
        let resp = StatsResponse {
            user_id: "42".to_string(),
            display_name: "alice".to_string(),
            role: Role::User,
            today: "2024-01-31".to_string(),
            period: "monthly".to_string(),
            daily: 2.0,
            monthly: 5.0,
            total: 10.0,
            budget: Some(10.0),
            remaining: Some(5.0),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"role\":\"USER\""));
        assert!(json.contains("\"monthly\":5.0"));
    }

    #[tokio::test]
    async fn guest_viewer_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = tollgate_config::TollgateConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.access.admin_ids = vec!["1".into()];
        let runtime = Runtime::from_config(config).unwrap();

        assert!(!run_stats(&runtime, "42", None, true, true).await.unwrap());
        assert!(run_stats(&runtime, "42", Some("1"), true, true).await.unwrap());
    }

    #[tokio::test]
    async fn stats_reads_record_spend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = tollgate_config::TollgateConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.access.admin_ids = vec!["1".into()];
        let runtime = Runtime::from_config(config).unwrap();

        runtime.store.add_cost("1", 1.5).await.unwrap();
        let record = runtime.store.get_or_create("1", "").await.unwrap();
        let summary = record.ledger.summary(runtime.store.today());
        assert_eq!(summary.daily, 1.5);
        assert_eq!(summary.total, 1.5);
        assert!(run_stats(&runtime, "1", None, true, true).await.unwrap());
    }
}
