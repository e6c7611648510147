//! Aggregate figures derived from a replayed schedule.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::round_cents;
use crate::loan::PaymentType;
use crate::operation::Operation;
use crate::replay::{AdjustmentKind, PaymentRecord};
use crate::types::Money;

/// Totals for a schedule. Derived on every replay, never stored as truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Regular instalments plus every prepayment in the log.
    pub total_payment: Money,
    pub total_interest: Money,
    pub total_periods: u32,
    /// Representative instalment (equal-payment only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_payment: Option<Money>,
    /// First instalment (equal-principal only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_payment: Option<Money>,
    /// Last instalment (equal-principal only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_payment: Option<Money>,
}

/// How the headline monthly payment of an equal-payment schedule is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonthlyPaymentPolicy {
    /// Latest rate-adjusted row, else the most common unadjusted instalment.
    #[default]
    Representative,
    FirstRow,
    LastRow,
}

/// Number of trailing rows excluded from the majority vote; the final
/// instalments of a schedule are usually payoff remainders.
const TRAILING_ROWS_EXCLUDED: usize = 3;

pub fn summarize(
    schedule: &[PaymentRecord],
    payment_type: PaymentType,
    operations: &[Operation],
) -> Summary {
    summarize_with_policy(
        schedule,
        payment_type,
        operations,
        MonthlyPaymentPolicy::default(),
    )
}

pub fn summarize_with_policy(
    schedule: &[PaymentRecord],
    payment_type: PaymentType,
    operations: &[Operation],
    policy: MonthlyPaymentPolicy,
) -> Summary {
    let regular: Money = schedule.iter().map(|r| r.payment).sum();
    let prepaid: Money = operations
        .iter()
        .filter_map(|op| op.kind.prepayment_amount())
        .sum();
    let total_interest: Money = schedule.iter().map(|r| r.interest).sum();

    let mut summary = Summary {
        total_payment: round_cents(regular + prepaid),
        total_interest: round_cents(total_interest),
        total_periods: schedule.len() as u32,
        ..Default::default()
    };

    let (Some(first), Some(last)) = (schedule.first(), schedule.last()) else {
        return summary;
    };

    match payment_type {
        PaymentType::EqualPayment => {
            summary.monthly_payment = Some(match policy {
                MonthlyPaymentPolicy::Representative => representative_payment(schedule, first),
                MonthlyPaymentPolicy::FirstRow => first.payment,
                MonthlyPaymentPolicy::LastRow => last.payment,
            });
        }
        PaymentType::EqualPrincipal => {
            summary.first_payment = Some(first.payment);
            summary.last_payment = Some(last.payment);
        }
    }

    summary
}

fn representative_payment(schedule: &[PaymentRecord], first: &PaymentRecord) -> Money {
    if let Some(row) = schedule
        .iter()
        .rev()
        .find(|r| r.adjustment == Some(AdjustmentKind::Rate))
    {
        return row.payment;
    }

    // Majority vote over cent-rounded instalments, in first-seen order so
    // ties go to the earliest value.
    let window = schedule.len().saturating_sub(TRAILING_ROWS_EXCLUDED).max(1);
    let mut tally: Vec<(Money, usize)> = Vec::new();
    for row in &schedule[..window] {
        if row.is_adjusted || row.payment <= Decimal::ZERO {
            continue;
        }
        let rounded = round_cents(row.payment);
        match tally.iter_mut().find(|(value, _)| *value == rounded) {
            Some((_, count)) => *count += 1,
            None => tally.push((rounded, 1)),
        }
    }

    let mut best: Option<(Money, usize)> = None;
    for (value, count) in tally {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value).unwrap_or(first.payment)
}

/// Movement of a single summary figure between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureImpact {
    pub before: Decimal,
    pub after: Decimal,
    /// `after - before`; negative means the figure went down.
    pub change: Decimal,
    /// Change relative to `before`, in percent. Zero when `before` is zero.
    pub change_pct: Decimal,
}

impl FigureImpact {
    fn between(before: Decimal, after: Decimal) -> Self {
        let change = after - before;
        let change_pct = if before.is_zero() {
            Decimal::ZERO
        } else {
            (change / before * dec!(100)).round_dp(4)
        };
        FigureImpact {
            before,
            after,
            change,
            change_pct,
        }
    }

    pub fn increased(&self) -> bool {
        self.change > Decimal::ZERO
    }
}

/// Before/after comparison of two summaries, as shown in operation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryImpact {
    pub total_payment: FigureImpact,
    pub total_interest: FigureImpact,
    pub total_periods: FigureImpact,
}

pub fn compare_summaries(before: &Summary, after: &Summary) -> SummaryImpact {
    SummaryImpact {
        total_payment: FigureImpact::between(before.total_payment, after.total_payment),
        total_interest: FigureImpact::between(before.total_interest, after.total_interest),
        total_periods: FigureImpact::between(
            Decimal::from(before.total_periods),
            Decimal::from(after.total_periods),
        ),
    }
}
