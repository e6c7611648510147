//! Closed-form amortisation helpers shared by the replay engine.
//!
//! Everything here is a pure function of its arguments. Rates passed in are
//! *monthly* decimal rates; convert annual percentages with [`monthly_rate`].

use chrono::{Months, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::types::{Money, Percent, Rate};

/// Balance at or below which a loan is treated as fully repaid.
pub const BALANCE_EPSILON: Money = dec!(0.01);

pub const MONTHS_PER_YEAR: u32 = 12;

/// Convert an annual percentage (4.5) to a monthly decimal rate (0.00375).
pub fn monthly_rate(annual_rate_percent: Percent) -> Rate {
    annual_rate_percent / dec!(100) / Decimal::from(MONTHS_PER_YEAR)
}

/// Level instalment that fully amortises `principal` over `periods` months.
///
/// PMT = P * r / (1 - (1 + r)^-n), which is the annuity formula
/// P * r * (1+r)^n / ((1+r)^n - 1) rearranged so the growth factor never
/// appears in a numerator. A zero rate degenerates to straight division.
pub fn annuity_payment(principal: Money, monthly_rate: Rate, periods: u32) -> Money {
    if periods == 0 {
        return Decimal::ZERO;
    }
    if monthly_rate.is_zero() {
        return principal / Decimal::from(periods);
    }

    let growth = match (Decimal::ONE + monthly_rate).checked_powu(u64::from(periods)) {
        Some(g) => g,
        // (1+r)^n beyond Decimal range: the discount term is effectively zero.
        None => return principal * monthly_rate,
    };
    let denom = Decimal::ONE - Decimal::ONE / growth;
    if denom.is_zero() {
        return principal / Decimal::from(periods);
    }
    principal * monthly_rate / denom
}

/// Number of level instalments of `payment` needed to retire `balance`.
///
/// Inverts the annuity formula: n = ceil(ln(pmt / (pmt - pv*r)) / ln(1 + r)).
/// When the instalment does not cover the first month's interest the
/// inversion has no solution and a single period is returned.
pub fn periods_for_payment(balance: Money, monthly_rate: Rate, payment: Money) -> u32 {
    if payment <= Decimal::ZERO {
        return 1;
    }
    if monthly_rate.is_zero() {
        return ceil_periods(balance / payment);
    }

    let interest = balance * monthly_rate;
    if payment <= interest {
        return 1;
    }

    let ratio = payment / (payment - interest);
    match (ratio.checked_ln(), (Decimal::ONE + monthly_rate).checked_ln()) {
        (Some(num), Some(den)) if !den.is_zero() => ceil_periods(num / den),
        _ => 1,
    }
}

/// Number of fixed principal instalments needed to retire `balance`.
pub fn periods_for_principal(balance: Money, monthly_principal: Money) -> u32 {
    if monthly_principal <= Decimal::ZERO {
        return 1;
    }
    ceil_periods(balance / monthly_principal)
}

fn ceil_periods(n: Decimal) -> u32 {
    n.ceil().to_u32().unwrap_or(u32::MAX).max(1)
}

/// Round to cents, half away from zero.
pub fn round_cents(value: Money) -> Money {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Due date of `period` (1-based) for a loan whose first payment falls on
/// `start_date`. Day-of-month is clamped to the end of shorter months.
pub fn payment_date(start_date: NaiveDate, period: u32) -> NaiveDate {
    start_date
        .checked_add_months(Months::new(period.saturating_sub(1)))
        .unwrap_or(NaiveDate::MAX)
}
