//! Caller-side owner of a plan's operation log.
//!
//! `MortgagePlan` is the only thing that mutates the log. Every mutation
//! (append, delete, revert) is followed by a full replay from the original
//! loan terms; the schedule and summary it exposes are never edited in place.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MortgageReplayError;
use crate::loan::LoanInput;
use crate::operation::{Operation, OperationKind};
use crate::plan::PlanInput;
use crate::replay::{replay_with_policy, Schedule};
use crate::summary::{compare_summaries, MonthlyPaymentPolicy, Summary, SummaryImpact};
use crate::types::Money;
use crate::validation::{ensure_valid_loan, validate_operation};
use crate::MortgageReplayResult;

const ID_PREFIX: &str = "op-";

#[derive(Debug, Clone)]
pub struct MortgagePlan {
    loan: LoanInput,
    operations: Vec<Operation>,
    policy: MonthlyPaymentPolicy,
    next_sequence: u64,
    initial_summary: Summary,
    schedule: Schedule,
    summary: Summary,
}

/// One card in the plan's summary timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub summary: Summary,
    /// Reduction in total payment versus the initial plan, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings: Option<Money>,
}

/// An operation together with the change it caused when it was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sequence: usize,
    pub operation: Operation,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<SummaryImpact>,
}

impl MortgagePlan {
    /// Start a plan with an empty log. Loan terms must pass caller validation.
    pub fn new(loan: LoanInput) -> MortgageReplayResult<Self> {
        Self::with_policy(loan, MonthlyPaymentPolicy::default())
    }

    pub fn with_policy(loan: LoanInput, policy: MonthlyPaymentPolicy) -> MortgageReplayResult<Self> {
        Self::restore(loan, Vec::new(), policy)
    }

    /// Rebuild a plan from a previously persisted log.
    pub fn restore(
        loan: LoanInput,
        operations: Vec<Operation>,
        policy: MonthlyPaymentPolicy,
    ) -> MortgageReplayResult<Self> {
        ensure_valid_loan(&loan)?;

        let next_sequence = operations
            .iter()
            .filter_map(|op| op.id.strip_prefix(ID_PREFIX)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            .max(operations.len() as u64)
            + 1;

        let (_, initial_summary) = replay_with_policy(&loan, &[], policy);
        let (schedule, summary) = replay_with_policy(&loan, &operations, policy);

        Ok(MortgagePlan {
            loan,
            operations,
            policy,
            next_sequence,
            initial_summary,
            schedule,
            summary,
        })
    }

    pub fn from_input(input: PlanInput) -> MortgageReplayResult<Self> {
        Self::restore(input.loan, input.operations, input.monthly_payment_policy)
    }

    pub fn to_input(&self) -> PlanInput {
        PlanInput {
            loan: self.loan.clone(),
            operations: self.operations.clone(),
            monthly_payment_policy: self.policy,
        }
    }

    pub fn loan(&self) -> &LoanInput {
        &self.loan
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Summary of the plan with an empty log; unaffected by later operations.
    pub fn initial_summary(&self) -> &Summary {
        &self.initial_summary
    }

    /// Append an operation targeting `period` of the current schedule.
    ///
    /// The operation is validated against the current schedule, stamped with
    /// the summaries before and after it, and the plan is replayed.
    pub fn apply(
        &mut self,
        period: u32,
        kind: OperationKind,
        timestamp: DateTime<Utc>,
    ) -> MortgageReplayResult<&Operation> {
        validate_operation(&self.schedule, &self.operations, period, &kind)?;

        let id = format!("{ID_PREFIX}{}", self.next_sequence);
        let mut operation = Operation::new(id, period, kind, timestamp);
        operation.payment_date = self
            .schedule
            .iter()
            .find(|r| r.period == period)
            .map(|r| r.date);
        operation.before_summary = Some(self.summary.clone());

        let mut operations = self.operations.clone();
        operations.push(operation);
        let (schedule, summary) = replay_with_policy(&self.loan, &operations, self.policy);

        if let Some(last) = operations.last_mut() {
            last.after_summary = Some(summary.clone());
        }
        log::debug!(
            "appended {ID_PREFIX}{} at period {period}; total payment {} -> {}",
            self.next_sequence,
            self.summary.total_payment,
            summary.total_payment
        );

        self.next_sequence += 1;
        self.operations = operations;
        self.schedule = schedule;
        self.summary = summary;

        Ok(&self.operations[self.operations.len() - 1])
    }

    /// Remove a single operation from the log.
    pub fn delete(&mut self, id: &str) -> MortgageReplayResult<Operation> {
        let idx = self.position(id)?;
        let removed = self.operations.remove(idx);
        self.rebuild();
        Ok(removed)
    }

    /// Keep the log up to and including `id`; drop everything after it.
    pub fn revert_to(&mut self, id: &str) -> MortgageReplayResult<Vec<Operation>> {
        let idx = self.position(id)?;
        let removed = self.operations.split_off(idx + 1);
        self.rebuild();
        Ok(removed)
    }

    /// Operations in the order they were made, each with its recorded impact.
    pub fn history(&self) -> Vec<HistoryEntry> {
        let mut ordered: Vec<&Operation> = self.operations.iter().collect();
        ordered.sort_by_key(|op| op.timestamp);
        ordered
            .into_iter()
            .enumerate()
            .map(|(i, op)| HistoryEntry {
                sequence: i + 1,
                operation: op.clone(),
                description: op.description(),
                impact: match (&op.before_summary, &op.after_summary) {
                    (Some(before), Some(after)) => Some(compare_summaries(before, after)),
                    _ => None,
                },
            })
            .collect()
    }

    /// Initial plan followed by the plan after each rate change or prepayment.
    pub fn timeline(&self) -> Vec<PlanSnapshot> {
        let mut snapshots = vec![PlanSnapshot {
            title: "Initial plan".into(),
            operation_id: None,
            description: None,
            summary: self.initial_summary.clone(),
            savings: None,
        }];

        let relevant = self
            .operations
            .iter()
            .filter(|op| !matches!(op.kind, OperationKind::PaymentAdjustment { .. }));
        for (i, op) in relevant.enumerate() {
            let summary = op.after_summary.clone().unwrap_or_else(|| self.summary.clone());
            let change = summary.total_payment - self.initial_summary.total_payment;
            let title = match op.kind {
                OperationKind::RateAdjustment { .. } => "rate adjustment",
                _ => "prepayment",
            };
            snapshots.push(PlanSnapshot {
                title: format!("Scenario {}: {}", i + 1, title),
                operation_id: Some(op.id.clone()),
                description: Some(op.description()),
                summary,
                savings: (change < Decimal::ZERO).then(|| -change),
            });
        }

        snapshots
    }

    fn position(&self, id: &str) -> MortgageReplayResult<usize> {
        self.operations
            .iter()
            .position(|op| op.id == id)
            .ok_or_else(|| MortgageReplayError::OperationNotFound(id.to_string()))
    }

    fn rebuild(&mut self) {
        let (schedule, summary) = replay_with_policy(&self.loan, &self.operations, self.policy);
        self.schedule = schedule;
        self.summary = summary;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::PaymentType;
    use crate::operation::PrepaymentMode;
    use crate::replay::replay;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn loan() -> LoanInput {
        LoanInput {
            principal: dec!(600_000),
            annual_rate_percent: dec!(4.2),
            term_months: 300,
            start_date: NaiveDate::from_ymd_opt(2024, 2, 20).unwrap(),
            payment_type: PaymentType::EqualPayment,
        }
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn rate(r: Decimal) -> OperationKind {
        OperationKind::RateAdjustment { new_rate_percent: r }
    }

    fn prepay(amount: Decimal) -> OperationKind {
        OperationKind::Prepayment {
            amount,
            mode: PrepaymentMode::ReduceTerm,
        }
    }

    #[test]
    fn test_new_plan_matches_plain_replay() {
        let plan = MortgagePlan::new(loan()).unwrap();
        let (schedule, summary) = replay(&loan(), &[]);
        assert_eq!(plan.schedule(), &schedule);
        assert_eq!(plan.summary(), &summary);
        assert_eq!(plan.initial_summary(), &summary);
    }

    #[test]
    fn test_new_plan_rejects_invalid_loan() {
        let mut input = loan();
        input.annual_rate_percent = dec!(75);
        assert!(MortgagePlan::new(input).is_err());
    }

    #[test]
    fn test_apply_captures_before_and_after() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        let before = plan.summary().clone();
        let op = plan.apply(24, prepay(dec!(100_000)), at(0)).unwrap().clone();

        assert_eq!(op.id, "op-1");
        assert_eq!(op.before_summary.as_ref(), Some(&before));
        assert_eq!(op.after_summary.as_ref(), Some(plan.summary()));
        assert_eq!(op.payment_date, Some(NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()));
        assert!(plan.summary().total_periods < before.total_periods);
    }

    #[test]
    fn test_apply_rejects_invalid_operation_without_mutating() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        let before = plan.summary().clone();
        assert!(plan.apply(301, rate(dec!(3)), at(0)).is_err());
        assert!(plan.apply(10, rate(dec!(0)), at(0)).is_err());
        assert!(plan.operations().is_empty());
        assert_eq!(plan.summary(), &before);
    }

    #[test]
    fn test_delete_equals_replay_of_remaining_log() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        plan.apply(12, rate(dec!(3.6)), at(0)).unwrap();
        plan.apply(36, prepay(dec!(50_000)), at(1)).unwrap();
        plan.apply(60, rate(dec!(4.8)), at(2)).unwrap();

        let removed = plan.delete("op-2").unwrap();
        assert_eq!(removed.period, 36);

        let (schedule, summary) = replay(&loan(), plan.operations());
        assert_eq!(plan.schedule(), &schedule);
        assert_eq!(plan.summary(), &summary);
        assert_eq!(plan.operations().len(), 2);
    }

    #[test]
    fn test_revert_keeps_prefix_inclusive() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        plan.apply(12, rate(dec!(3.6)), at(0)).unwrap();
        let after_first = plan.summary().clone();
        plan.apply(36, prepay(dec!(50_000)), at(1)).unwrap();
        plan.apply(60, rate(dec!(4.8)), at(2)).unwrap();

        let dropped = plan.revert_to("op-1").unwrap();
        assert_eq!(dropped.len(), 2);
        assert_eq!(plan.operations().len(), 1);
        assert_eq!(plan.summary(), &after_first);
    }

    #[test]
    fn test_unknown_id() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        assert!(matches!(
            plan.delete("op-9"),
            Err(MortgageReplayError::OperationNotFound(_))
        ));
        assert!(plan.revert_to("op-9").is_err());
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        plan.apply(12, rate(dec!(3.6)), at(0)).unwrap();
        plan.apply(24, rate(dec!(3.9)), at(1)).unwrap();
        plan.delete("op-2").unwrap();
        let id = plan.apply(30, rate(dec!(4.0)), at(2)).unwrap().id.clone();
        assert_eq!(id, "op-3");
    }

    #[test]
    fn test_restore_continues_sequence() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        plan.apply(12, rate(dec!(3.6)), at(0)).unwrap();
        plan.apply(24, rate(dec!(3.9)), at(1)).unwrap();

        let mut restored = MortgagePlan::from_input(plan.to_input()).unwrap();
        assert_eq!(restored.schedule(), plan.schedule());
        let id = restored.apply(48, rate(dec!(4.1)), at(2)).unwrap().id.clone();
        assert_eq!(id, "op-3");
    }

    #[test]
    fn test_history_sorted_by_timestamp_with_impact() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        plan.apply(60, rate(dec!(4.8)), at(5)).unwrap();
        plan.apply(12, prepay(dec!(20_000)), at(1)).unwrap();

        let history = plan.history();
        assert_eq!(history[0].operation.id, "op-2");
        assert_eq!(history[1].operation.id, "op-1");
        let impact = history[0].impact.as_ref().unwrap();
        assert!(impact.total_interest.change < Decimal::ZERO);
    }

    #[test]
    fn test_timeline_reports_savings() {
        let mut plan = MortgagePlan::new(loan()).unwrap();
        plan.apply(
            6,
            OperationKind::PaymentAdjustment {
                new_payment: dec!(5000),
            },
            at(0),
        )
        .unwrap();
        plan.apply(12, prepay(dec!(80_000)), at(1)).unwrap();
        plan.apply(24, rate(dec!(6.5)), at(2)).unwrap();

        let timeline = plan.timeline();
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].title, "Initial plan");
        assert!(timeline[1].savings.is_some());
        assert_eq!(timeline[2].operation_id.as_deref(), Some("op-3"));
    }
}
