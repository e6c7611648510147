//! Amortisation replay engine.
//!
//! The schedule is rebuilt from scratch on every call: original loan terms
//! plus the operation log go in, a full period-by-period schedule comes out.
//! There is no incremental path. All mutable simulation state lives in
//! [`ReplayState`], advanced one period at a time by [`step`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::amortization::{
    annuity_payment, monthly_rate, payment_date, periods_for_payment, periods_for_principal,
    round_cents, BALANCE_EPSILON,
};
use crate::loan::{LoanInput, PaymentType};
use crate::operation::{Operation, OperationKind, PrepaymentMode};
use crate::summary::{summarize_with_policy, MonthlyPaymentPolicy, Summary};
use crate::types::{Money, Percent};
use crate::validation::MAX_TERM_MONTHS;

/// Why a schedule row differs from the plain amortisation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Payment,
    Rate,
}

/// A single row of the payment schedule. Monetary fields are in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub period: u32,
    pub date: NaiveDate,
    pub payment: Money,
    pub principal: Money,
    pub interest: Money,
    pub remaining_balance: Money,
    /// Annual rate in force for this period, in percent.
    pub rate_percent: Percent,
    pub is_adjusted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<AdjustmentKind>,
}

pub type Schedule = Vec<PaymentRecord>;

/// Simulation state threaded through the forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayState {
    pub remaining_principal: Money,
    pub rate_percent: Percent,
    pub remaining_periods: u32,
    /// Level instalment (equal-payment only).
    pub monthly_payment: Money,
    /// Fixed principal instalment (equal-principal only).
    pub monthly_principal: Money,
    pub current_period: u32,
}

impl ReplayState {
    /// State at the start of period 1.
    pub fn initial(input: &LoanInput) -> Self {
        let mut state = ReplayState {
            remaining_principal: input.principal,
            rate_percent: input.annual_rate_percent,
            remaining_periods: input.term_months,
            monthly_payment: Decimal::ZERO,
            monthly_principal: Decimal::ZERO,
            current_period: 1,
        };
        match input.payment_type {
            PaymentType::EqualPayment => {
                state.monthly_payment = annuity_payment(
                    input.principal,
                    monthly_rate(input.annual_rate_percent),
                    input.term_months,
                );
            }
            PaymentType::EqualPrincipal => {
                state.monthly_principal = input.principal / Decimal::from(input.term_months);
            }
        }
        state
    }

    fn has_balance(&self) -> bool {
        self.remaining_principal > BALANCE_EPSILON
    }

    /// New rate from the next period on. Equal-principal keeps its principal
    /// instalment; only the interest changes.
    fn apply_rate_adjustment(&mut self, new_rate_percent: Percent, payment_type: PaymentType) {
        self.rate_percent = new_rate_percent;
        if payment_type == PaymentType::EqualPayment
            && self.has_balance()
            && self.remaining_periods > 0
        {
            self.monthly_payment = annuity_payment(
                self.remaining_principal,
                monthly_rate(new_rate_percent),
                self.remaining_periods,
            );
        }
    }

    fn apply_prepayment(&mut self, amount: Money, mode: PrepaymentMode, payment_type: PaymentType) {
        self.remaining_principal = (self.remaining_principal - amount).max(Decimal::ZERO);
        let rate = monthly_rate(self.rate_percent);

        match (mode, payment_type) {
            (PrepaymentMode::ReduceTerm, _) if !self.has_balance() => {
                self.remaining_periods = 0;
            }
            (PrepaymentMode::ReduceTerm, PaymentType::EqualPayment) => {
                self.remaining_periods =
                    periods_for_payment(self.remaining_principal, rate, self.monthly_payment);
            }
            (PrepaymentMode::ReduceTerm, PaymentType::EqualPrincipal) => {
                self.remaining_periods =
                    periods_for_principal(self.remaining_principal, self.monthly_principal);
            }
            (PrepaymentMode::ReducePayment, PaymentType::EqualPayment) => {
                self.monthly_payment = if self.has_balance() && self.remaining_periods > 0 {
                    annuity_payment(self.remaining_principal, rate, self.remaining_periods)
                } else {
                    Decimal::ZERO
                };
            }
            (PrepaymentMode::ReducePayment, PaymentType::EqualPrincipal) => {
                self.monthly_principal = if self.remaining_periods > 0 {
                    self.remaining_principal / Decimal::from(self.remaining_periods)
                } else {
                    Decimal::ZERO
                };
            }
        }
    }
}

/// Operations resolved for a single period, at most one of each kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodOperations {
    pub new_rate_percent: Option<Percent>,
    pub payment_override: Option<Money>,
    pub prepayment: Option<(Money, PrepaymentMode)>,
}

impl PeriodOperations {
    /// Fold one operation in. The first of each kind in log order wins.
    fn absorb(&mut self, kind: &OperationKind) {
        match kind {
            OperationKind::RateAdjustment { new_rate_percent } => {
                self.new_rate_percent.get_or_insert(*new_rate_percent);
            }
            OperationKind::PaymentAdjustment { new_payment } => {
                self.payment_override.get_or_insert(*new_payment);
            }
            OperationKind::Prepayment { amount, mode } => {
                self.prepayment.get_or_insert((*amount, *mode));
            }
        }
    }
}

/// Group the log by target period.
pub fn index_operations(operations: &[Operation]) -> BTreeMap<u32, PeriodOperations> {
    let mut index: BTreeMap<u32, PeriodOperations> = BTreeMap::new();
    for op in operations {
        index.entry(op.period).or_default().absorb(&op.kind);
    }
    index
}

/// Advance the simulation by one period.
///
/// Returns the state for the next period and the row emitted for this one.
/// A payment override shapes this period's split; a rate change and then a
/// prepayment are applied after the row is emitted, so both first affect the
/// following period. `rate_changed_last_period` flags rows whose instalment
/// was re-derived by a rate adjustment on the previous period.
pub fn step(
    input: &LoanInput,
    state: &ReplayState,
    ops: &PeriodOperations,
    rate_changed_last_period: bool,
) -> (ReplayState, PaymentRecord) {
    let remaining = state.remaining_principal;
    let interest = remaining * monthly_rate(state.rate_percent);

    let (mut principal, mut payment) = match input.payment_type {
        PaymentType::EqualPayment => {
            let principal = (state.monthly_payment - interest).max(Decimal::ZERO);
            if principal > remaining {
                (remaining, remaining + interest)
            } else {
                (principal, state.monthly_payment)
            }
        }
        PaymentType::EqualPrincipal => {
            let principal = state.monthly_principal.min(remaining);
            (principal, principal + interest)
        }
    };

    if let Some(new_payment) = ops.payment_override {
        payment = new_payment;
        principal = (new_payment - interest).max(Decimal::ZERO);
        if principal > remaining {
            principal = remaining;
            payment = remaining + interest;
        }
    }

    let adjustment = if ops.payment_override.is_some() {
        Some(AdjustmentKind::Payment)
    } else if rate_changed_last_period {
        Some(AdjustmentKind::Rate)
    } else {
        None
    };

    let record = PaymentRecord {
        period: state.current_period,
        date: payment_date(input.start_date, state.current_period),
        payment: round_cents(payment),
        principal: round_cents(principal),
        interest: round_cents(interest),
        remaining_balance: round_cents(remaining - principal),
        rate_percent: state.rate_percent,
        is_adjusted: adjustment.is_some(),
        adjustment,
    };

    let mut next = ReplayState {
        remaining_principal: remaining - principal,
        remaining_periods: state.remaining_periods.saturating_sub(1),
        current_period: state.current_period + 1,
        ..*state
    };

    if let Some(new_rate) = ops.new_rate_percent {
        next.apply_rate_adjustment(new_rate, input.payment_type);
    }
    if let Some((amount, mode)) = ops.prepayment {
        next.apply_prepayment(amount, mode, input.payment_type);
    }

    (next, record)
}

/// Rebuild the payment schedule for `input` under the given operation log.
///
/// Stops when the balance is repaid or the original term is exhausted,
/// whichever comes first; no period beyond `term_months` is ever produced.
/// Malformed loan terms yield an empty schedule.
pub fn build_schedule(input: &LoanInput, operations: &[Operation]) -> Schedule {
    if !input.is_well_formed() {
        log::debug!("replay skipped: malformed loan input");
        return Vec::new();
    }

    let index = index_operations(operations);
    let no_ops = PeriodOperations::default();
    let mut state = ReplayState::initial(input);
    let mut schedule = Vec::with_capacity(input.term_months.min(MAX_TERM_MONTHS) as usize);

    while state.has_balance() && state.current_period <= input.term_months {
        let period = state.current_period;
        let ops = index.get(&period).unwrap_or(&no_ops);
        let rate_changed_last_period = period > 1
            && index
                .get(&(period - 1))
                .is_some_and(|prev| prev.new_rate_percent.is_some());

        if ops != &no_ops {
            log::debug!("period {period}: applying {ops:?}");
        }

        let (next, record) = step(input, &state, ops, rate_changed_last_period);
        schedule.push(record);
        state = next;
    }

    if state.has_balance() {
        log::warn!(
            "schedule capped at {} periods with {} outstanding",
            input.term_months,
            round_cents(state.remaining_principal)
        );
    }

    schedule
}

/// Replay the operation log and summarise the result.
pub fn replay(input: &LoanInput, operations: &[Operation]) -> (Schedule, Summary) {
    replay_with_policy(input, operations, MonthlyPaymentPolicy::default())
}

pub fn replay_with_policy(
    input: &LoanInput,
    operations: &[Operation],
    policy: MonthlyPaymentPolicy,
) -> (Schedule, Summary) {
    let schedule = build_schedule(input, operations);
    if schedule.is_empty() {
        return (schedule, Summary::default());
    }
    let summary = summarize_with_policy(&schedule, input.payment_type, operations, policy);
    (schedule, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn assert_close(actual: Decimal, expected: Decimal, tol: Decimal, msg: &str) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "{}: expected ~{}, got {} (diff = {})",
            msg,
            expected,
            actual,
            diff
        );
    }

    fn loan(payment_type: PaymentType) -> LoanInput {
        LoanInput {
            principal: dec!(120_000),
            annual_rate_percent: dec!(6),
            term_months: 120,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            payment_type,
        }
    }

    fn op(id: &str, period: u32, kind: OperationKind) -> Operation {
        Operation::new(id, period, kind, Utc.timestamp_opt(0, 0).unwrap())
    }

    #[test]
    fn test_initial_state_equal_payment() {
        let state = ReplayState::initial(&loan(PaymentType::EqualPayment));
        assert_eq!(state.current_period, 1);
        assert_eq!(state.remaining_periods, 120);
        assert_eq!(state.monthly_principal, Decimal::ZERO);
        // 120k @ 6% over 10y -> 1332.25
        assert_close(state.monthly_payment, dec!(1332.25), dec!(0.01), "seed payment");
    }

    #[test]
    fn test_initial_state_equal_principal() {
        let state = ReplayState::initial(&loan(PaymentType::EqualPrincipal));
        assert_eq!(state.monthly_principal, dec!(1000));
        assert_eq!(state.monthly_payment, Decimal::ZERO);
    }

    #[test]
    fn test_step_first_period_split() {
        let input = loan(PaymentType::EqualPrincipal);
        let state = ReplayState::initial(&input);
        let (next, row) = step(&input, &state, &PeriodOperations::default(), false);

        assert_eq!(row.period, 1);
        assert_eq!(row.interest, dec!(600));
        assert_eq!(row.principal, dec!(1000));
        assert_eq!(row.payment, dec!(1600));
        assert_eq!(row.remaining_balance, dec!(119000));
        assert!(!row.is_adjusted);
        assert_eq!(next.remaining_principal, dec!(119000));
        assert_eq!(next.remaining_periods, 119);
        assert_eq!(next.current_period, 2);
    }

    #[test]
    fn test_step_does_not_mutate_input_state() {
        let input = loan(PaymentType::EqualPayment);
        let state = ReplayState::initial(&input);
        let before = state;
        let _ = step(&input, &state, &PeriodOperations::default(), false);
        assert_eq!(state, before);
    }

    #[test]
    fn test_payment_override_below_interest_clamps_principal() {
        let input = loan(PaymentType::EqualPayment);
        let state = ReplayState::initial(&input);
        let ops = PeriodOperations {
            payment_override: Some(dec!(100)),
            ..Default::default()
        };
        let (next, row) = step(&input, &state, &ops, false);
        assert_eq!(row.payment, dec!(100));
        assert_eq!(row.principal, Decimal::ZERO);
        assert_eq!(row.adjustment, Some(AdjustmentKind::Payment));
        assert_eq!(next.remaining_principal, dec!(120000));
    }

    #[test]
    fn test_payment_override_above_balance_pays_off_exactly() {
        let input = loan(PaymentType::EqualPayment);
        let state = ReplayState::initial(&input);
        let ops = PeriodOperations {
            payment_override: Some(dec!(500_000)),
            ..Default::default()
        };
        let (next, row) = step(&input, &state, &ops, false);
        assert_eq!(row.principal, dec!(120000));
        assert_eq!(row.payment, dec!(120600));
        assert_eq!(row.remaining_balance, Decimal::ZERO);
        assert_eq!(next.remaining_principal, Decimal::ZERO);
    }

    #[test]
    fn test_prepayment_exceeding_balance_clamps_to_zero() {
        let input = loan(PaymentType::EqualPayment);
        let schedule = build_schedule(
            &input,
            &[op(
                "a",
                1,
                OperationKind::Prepayment {
                    amount: dec!(1_000_000),
                    mode: PrepaymentMode::ReduceTerm,
                },
            )],
        );
        assert_eq!(schedule.len(), 1);
    }

    #[test]
    fn test_rate_then_prepayment_same_period_uses_new_rate() {
        let input = loan(PaymentType::EqualPayment);
        let state = ReplayState::initial(&input);
        let ops = PeriodOperations {
            new_rate_percent: Some(dec!(3)),
            prepayment: Some((dec!(20_000), PrepaymentMode::ReducePayment)),
            ..Default::default()
        };
        let (next, _) = step(&input, &state, &ops, false);
        let expected = annuity_payment(next.remaining_principal, monthly_rate(dec!(3)), 119);
        assert_eq!(next.rate_percent, dec!(3));
        assert_eq!(next.monthly_payment, expected);
    }

    #[test]
    fn test_first_operation_of_a_kind_wins() {
        let index = index_operations(&[
            op(
                "a",
                5,
                OperationKind::RateAdjustment {
                    new_rate_percent: dec!(5),
                },
            ),
            op(
                "b",
                5,
                OperationKind::RateAdjustment {
                    new_rate_percent: dec!(7),
                },
            ),
        ]);
        assert_eq!(index[&5].new_rate_percent, Some(dec!(5)));
    }

    #[test]
    fn test_malformed_input_yields_empty_schedule() {
        let mut input = loan(PaymentType::EqualPayment);
        input.term_months = 0;
        let (schedule, summary) = replay(&input, &[]);
        assert!(schedule.is_empty());
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_equal_principal_reduce_payment_keeps_length() {
        let input = loan(PaymentType::EqualPrincipal);
        let schedule = build_schedule(
            &input,
            &[op(
                "a",
                10,
                OperationKind::Prepayment {
                    amount: dec!(30_000),
                    mode: PrepaymentMode::ReducePayment,
                },
            )],
        );
        assert_eq!(schedule.len(), 120);
        // 120000 - 10*1000 - 30000 = 80000 over 110 periods
        assert_close(schedule[10].principal, dec!(727.27), dec!(0.01), "new principal");
    }

    #[test]
    fn test_huge_term_short_schedule_does_not_preallocate() {
        let input = LoanInput {
            principal: dec!(5000),
            annual_rate_percent: dec!(5),
            term_months: 1_000_000_000,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            payment_type: PaymentType::EqualPrincipal,
        };
        let (schedule, summary) = replay(
            &input,
            &[op(
                "a",
                1,
                OperationKind::Prepayment {
                    amount: dec!(5000),
                    mode: PrepaymentMode::ReduceTerm,
                },
            )],
        );
        assert_eq!(schedule.len(), 1);
        assert_eq!(summary.total_periods, 1);
    }
}
