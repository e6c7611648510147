use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::amortization::BALANCE_EPSILON;
use crate::loan::LoanInput;
use crate::operation::{Operation, OperationKind};
use crate::replay::{build_schedule, AdjustmentKind, Schedule};
use crate::summary::{summarize_with_policy, MonthlyPaymentPolicy, Summary};
use crate::types::{with_metadata, ComputationOutput};
use crate::MortgageReplayResult;

/// A persisted plan: loan terms plus the operation log to replay over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanInput {
    pub loan: LoanInput,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub monthly_payment_policy: MonthlyPaymentPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutput {
    pub schedule: Schedule,
    pub summary: Summary,
}

/// Replay a plan and wrap the result in the standard output envelope.
///
/// Unlike [`crate::replay::replay`], malformed loan terms are reported as an
/// error rather than an empty schedule. Conditions the engine silently clamps
/// are surfaced as warnings.
pub fn analyze_plan(input: &PlanInput) -> MortgageReplayResult<ComputationOutput<PlanOutput>> {
    let start = Instant::now();
    input.loan.check()?;

    let schedule = build_schedule(&input.loan, &input.operations);
    let summary = summarize_with_policy(
        &schedule,
        input.loan.payment_type,
        &input.operations,
        input.monthly_payment_policy,
    );
    let warnings = collect_warnings(&input.loan, &input.operations, &schedule);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Event-sourced amortisation replay",
        &serde_json::json!({
            "principal": input.loan.principal.to_string(),
            "annual_rate_percent": input.loan.annual_rate_percent.to_string(),
            "term_months": input.loan.term_months,
            "payment_type": input.loan.payment_type,
            "operations": input.operations.len(),
            "monthly_payment_policy": input.monthly_payment_policy,
        }),
        warnings,
        elapsed,
        PlanOutput { schedule, summary },
    ))
}

/// Conditions the engine absorbed without failing that a reader should know about.
pub fn collect_warnings(loan: &LoanInput, operations: &[Operation], schedule: &Schedule) -> Vec<String> {
    let mut warnings = Vec::new();
    let last_period = schedule.last().map_or(0, |r| r.period);

    if let Some(last) = schedule.last() {
        if last.period == loan.term_months && last.remaining_balance > BALANCE_EPSILON {
            warnings.push(format!(
                "Schedule reached the {}-month term with {} still outstanding",
                loan.term_months, last.remaining_balance
            ));
        }
    }

    let mut seen: BTreeMap<(u32, &'static str), &str> = BTreeMap::new();
    for op in operations {
        if let Some(first_id) = seen.get(&(op.period, op.kind.label())) {
            warnings.push(format!(
                "Operation {} ignored: period {} already has {} {}",
                op.id,
                op.period,
                op.kind.label(),
                first_id
            ));
            continue;
        }
        seen.insert((op.period, op.kind.label()), op.id.as_str());

        let Some(row) = schedule.iter().find(|r| r.period == op.period) else {
            warnings.push(format!(
                "Operation {} targets period {} but the schedule ends at period {}",
                op.id, op.period, last_period
            ));
            continue;
        };

        match &op.kind {
            OperationKind::PaymentAdjustment { new_payment } => {
                if row.adjustment == Some(AdjustmentKind::Payment) && *new_payment < row.interest {
                    warnings.push(format!(
                        "Payment override {} at period {} is below that period's interest {}; no principal repaid",
                        new_payment, op.period, row.interest
                    ));
                }
            }
            OperationKind::Prepayment { amount, .. } => {
                if *amount > row.remaining_balance {
                    warnings.push(format!(
                        "Prepayment {} at period {} exceeds the outstanding balance {}",
                        amount, op.period, row.remaining_balance
                    ));
                }
            }
            OperationKind::RateAdjustment { .. } => {}
        }
    }

    warnings
}
