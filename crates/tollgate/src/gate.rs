// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate check`, `tollgate record`, and `tollgate fetch`.
//!
//! These are the calls a chat transport makes around each model request:
//! check before, then record a known cost or fetch it by generation id.

use serde::Serialize;
use tollgate_core::{Role, TollgateError};
use tollgate_cost::{AccessDecision, Accrual, DenyReason};

use crate::runtime::Runtime;

/// Structured `check` output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub user_id: String,
    pub allowed: bool,
    pub role: Role,
    pub period: String,
    pub spent: Option<f64>,
    pub budget: Option<f64>,
    pub reason: Option<String>,
}

impl CheckResponse {
    fn new(user_id: &str, period: String, decision: &AccessDecision) -> Self {
        Self {
            user_id: user_id.to_string(),
            allowed: decision.allowed,
            role: decision.role,
            period,
            spent: decision.spent,
            budget: decision.budget,
            reason: decision.deny_reason.map(|r| deny_message(r).to_string()),
        }
    }
}

/// Structured `record`/`fetch` output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct AccrualResponse {
    pub user_id: String,
    pub amount: f64,
    pub day: String,
    pub day_total: f64,
    pub saved: bool,
}

impl AccrualResponse {
    fn new(user_id: &str, accrual: &Accrual) -> Self {
        Self {
            user_id: user_id.to_string(),
            amount: accrual.amount,
            day: accrual.day.to_string(),
            day_total: accrual.day_total,
            saved: accrual.saved,
        }
    }
}

fn deny_message(reason: DenyReason) -> &'static str {
    match reason {
        DenyReason::BudgetExhausted => "budget exhausted",
        DenyReason::LedgerUnavailable => "usage ledger unavailable",
    }
}

/// Run `tollgate check`. Returns whether access is allowed.
pub async fn run_check(
    runtime: &Runtime,
    user_id: &str,
    display_name: &str,
    json: bool,
) -> Result<bool, TollgateError> {
    if !display_name.is_empty() {
        runtime.store.get_or_create(user_id, display_name).await?;
    }
    let decision = runtime.access.has_access(user_id).await;
    let period = runtime.access.policy().period.to_string();
    let response = CheckResponse::new(user_id, period, &decision);

    if json {
        print_json(&response);
    } else {
        println!("{}", format_check(&response));
    }
    Ok(decision.allowed)
}

/// Run `tollgate record`.
pub async fn run_record(
    runtime: &Runtime,
    user_id: &str,
    amount: f64,
    json: bool,
) -> Result<(), TollgateError> {
    let accrual = runtime.store.add_cost(user_id, amount).await?;
    print_accrual(&AccrualResponse::new(user_id, &accrual), json);
    Ok(())
}

/// Run `tollgate fetch`.
pub async fn run_fetch(
    runtime: &Runtime,
    user_id: &str,
    generation_id: &str,
    json: bool,
) -> Result<(), TollgateError> {
    let client = runtime.cost_client()?;
    let accrual = client
        .fetch_and_record(&runtime.store, generation_id, user_id, runtime.fetch_timeout())
        .await?;
    print_accrual(&AccrualResponse::new(user_id, &accrual), json);
    Ok(())
}

fn print_accrual(response: &AccrualResponse, json: bool) {
    if json {
        print_json(response);
        return;
    }
    println!(
        "recorded ${:.6} for {} on {} (day total ${:.6})",
        response.amount, response.user_id, response.day, response.day_total
    );
    if !response.saved {
        eprintln!("warning: usage file could not be written; the cost is held in memory only");
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn format_check(response: &CheckResponse) -> String {
    let verdict = if response.allowed { "allowed" } else { "denied" };
    match (response.spent, response.budget) {
        (Some(spent), Some(budget)) => {
            let mut line = format!(
                "{}: {verdict} ({}, {} spend ${spent:.4} of ${budget:.4})",
                response.user_id, response.role, response.period
            );
            if let Some(reason) = &response.reason {
                line.push_str(&format!(": {reason}"));
            }
            line
        }
        _ => match &response.reason {
            Some(reason) => format!("{}: {verdict} ({}): {reason}", response.user_id, response.role),
            None => format!("{}: {verdict} ({})", response.user_id, response.role),
        },
    }
}
